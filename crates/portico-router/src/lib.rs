//! # Portico Router
//!
//! Route table for the Portico application host.
//!
//! A [`Router`] maps `(method, path)` to a handler. Paths are patterns with
//! `{name}` segments. Routes may carry a name for reverse lookup, a
//! [`RequestShape`](portico_validate::RequestShape) checked before the
//! handler runs, and their own middleware. Groups share the route table but
//! add a path prefix and a middleware scope.
//!
//! Dispatch order for a matched route:
//!
//! 1. group middleware, outermost group first
//! 2. route middleware
//! 3. the request gate
//! 4. the handler, only if the gate accepted the request

#![doc(html_root_url = "https://docs.rs/portico-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod group;
pub mod middleware;
mod route;
mod router;

pub use error::RouteError;
pub use middleware::{Middleware, Next};
pub use route::{Handler, Route, RouteMatch, RouteRef};
pub use router::{not_found, panic_message, Router};
