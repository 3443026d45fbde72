//! # Portico
//!
//! **Lifecycle-managed HTTP application host with validated request admission**
//!
//! Portico owns the listening socket, a single-use
//! `Created → Preparing → Ready → Stopped` state machine, graceful
//! shutdown with startup and shutdown hooks, and a request gate that
//! validates every request against its route's shape before the handler
//! runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portico::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = portico::bootstrap(ConfigLoader::new().with_env_prefix("APP").load()?)?;
//!
//!     server
//!         .router()
//!         .post("/users", |req: DomainRequest| async move {
//!             Json(serde_json::json!({ "name": req.get("name") }))
//!         })
//!         .shape(RequestShape::new().field("name", [Rule::Required, Rule::String]));
//!
//!     server.register_signal_hook()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! accept → router match ─┬─ none ─────────────────────────▶ 404
//!                        └─ group mw → route mw → gate ─┬─ malformed ─▶ 400
//!                                                       ├─ rules ─────▶ 422
//!                                                       └─ handler ───▶ response
//! ```

#![doc(html_root_url = "https://docs.rs/portico/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;

pub use bootstrap::{bootstrap, BootstrapError};

// Re-export core types
pub use portico_core as core;

// Re-export configuration
pub use portico_config as config;

// Re-export telemetry
pub use portico_telemetry as telemetry;

// Re-export the request gate
pub use portico_validate as validate;

// Re-export router types
pub use portico_router as router;

// Re-export server types
pub use portico_server as server;

/// Prelude module for convenient imports.
///
/// ```rust
/// use portico::prelude::*;
///
/// let server = Server::builder().build();
/// server.router().get("/ping", |_req: DomainRequest| async { "pong" });
/// ```
pub mod prelude {
    pub use portico_core::{HandlerError, HandlerResult, IntoResponse, Json, Params, Request, Response};

    pub use portico_config::{Config, ConfigError, ConfigLoader};

    pub use portico_telemetry::{init_logging, LogConfig};

    pub use portico_validate::{DomainRequest, RequestGate, RequestShape, Rule, ValidationOutcome};

    pub use portico_router::{Middleware, Next, Router};

    pub use portico_server::{
        Database, LifecycleError, LifecycleResult, Server, ServerConfig, ServerError, ServerState,
        Service, Transaction,
    };
}
