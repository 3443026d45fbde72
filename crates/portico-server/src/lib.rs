//! # Portico Server
//!
//! Lifecycle-managed HTTP host for the Portico application host.
//!
//! A [`Server`] moves through `Created → Preparing → Ready → Stopped`
//! exactly once:
//!
//! - `start` binds the listener, runs startup hooks once ready and serves
//!   until stopped
//! - `stop` refuses new connections, drains in-flight requests up to the
//!   drain timeout, runs shutdown hooks and closes the database handle
//! - a stopped server cannot be restarted
//!
//! The server also carries a service registry and an optional database
//! handle so application components can find each other at runtime.
//!
//! ## Example
//!
//! ```rust,no_run
//! use portico_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .config(ServerConfig::builder().host("0.0.0.0").port(8080).build())
//!         .build();
//!
//!     server.router().get("/ping", |_req| async { "pong" }).name("ping");
//!     server.register_shutdown_hook(|_server| async { Ok(()) });
//!     server.register_signal_hook()?;
//!
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/portico-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod address;
mod config;
mod database;
mod error;
mod error_sink;
mod lifecycle;
mod server;
mod services;
mod shutdown;
mod state;

pub use config::{ProxyConfig, ServerConfig, ServerConfigBuilder};
pub use database::{Database, DatabaseError, DatabaseResult, Transaction};
pub use error::{ServerError, ServerResult};
pub use error_sink::ErrorSink;
pub use lifecycle::{LifecycleError, LifecycleHook, LifecycleResult};
pub use server::{Server, ServerBuilder};
pub use services::{Service, ServiceError, ServiceRegistry};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
pub use state::ServerState;
