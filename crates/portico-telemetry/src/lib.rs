//! Logging setup for Portico.
//!
//! Portico logs through the [`tracing`] macros everywhere. This crate
//! installs the subscriber that turns those events into output: JSON lines
//! in production, a pretty human-readable format in development.
//!
//! # Example
//!
//! ```rust,ignore
//! use portico_config::ConfigLoader;
//! use portico_telemetry::{init_logging, LogConfig};
//!
//! let config = ConfigLoader::new().load()?;
//! init_logging(&LogConfig::from_config(&config))?;
//!
//! tracing::info!(addr = "127.0.0.1:8080", "Server listening");
//! ```

#![doc(html_root_url = "https://docs.rs/portico-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
