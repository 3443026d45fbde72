//! # Portico Core
//!
//! Core types shared by every layer of the Portico application host:
//!
//! - [`Request`] / [`Response`] - the buffered HTTP types flowing through routing
//! - [`IntoResponse`] - conversion of handler return values into responses
//! - [`Json`] - JSON response wrapper
//! - [`Params`] - path parameters captured by a route match
//! - [`HandlerError`] - errors a handler may return to abort its request

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod params;
pub mod response;
mod types;

pub use error::{HandlerError, HandlerResult};
pub use params::Params;
pub use response::{IntoResponse, Json};
pub use types::{BoxFuture, Request, Response, ResponseBody};
