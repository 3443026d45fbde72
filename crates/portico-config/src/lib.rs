//! Layered configuration for Portico.
//!
//! Configuration is a read-only tree of values addressed by dotted keys.
//! It is built in layers by [`ConfigLoader`]:
//! defaults → TOML/JSON file → explicit overrides → environment.
//!
//! # Example
//!
//! ```no_run
//! use portico_config::ConfigLoader;
//!
//! # fn main() -> Result<(), portico_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("portico.toml")?
//!     .with_env_prefix("PORTICO")
//!     .load()?;
//!
//! println!("listening on {}:{}",
//!     config.get_str("server.host").unwrap_or_default(),
//!     config.get_uint("server.port").unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! # Recognised keys
//!
//! ```toml
//! [app]
//! name = "portico"
//! environment = "localhost"
//! debug = true
//! defaultLanguage = "en-US"
//!
//! [server]
//! host = "127.0.0.1"
//! domain = ""
//! port = 8080
//! writeTimeout = 10
//! readTimeout = 10
//! idleTimeout = 20
//!
//! [server.proxy]
//! host = "example.com"
//! protocol = "https"
//! port = 443
//! base = "/api"
//! ```

#![doc(html_root_url = "https://docs.rs/portico-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::Config;
pub use error::ConfigError;
pub use loader::ConfigLoader;
