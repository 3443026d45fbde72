//! Wiring a server from loaded configuration.

use portico_config::{Config, ConfigError};
use portico_server::{Server, ServerBuilder};
use portico_telemetry::{init_logging, LogConfig, TelemetryError};
use thiserror::Error;

/// Errors raised while bootstrapping a server.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The `server.*` section is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// Installs logging according to `app.debug` and builds a [`Server`] from
/// the `server.*` section of `config`.
///
/// Logging can only be installed once per process; a second call fails
/// with [`BootstrapError::Telemetry`].
pub fn bootstrap(config: Config) -> Result<Server, BootstrapError> {
    init_logging(&LogConfig::from_config(&config))?;
    let server = ServerBuilder::from_config(config)?.build();

    tracing::info!(
        app = server.config().get_str("app.name").unwrap_or("portico"),
        environment = server.config().get_str("app.environment").unwrap_or_default(),
        host = %server.host(),
        "Server configured"
    );
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_config::ConfigLoader;

    #[test]
    fn test_bootstrap_reads_server_section() {
        let config = ConfigLoader::new()
            .with_value("server.port", 9090)
            .with_value("app.debug", false)
            .load()
            .unwrap();

        let server = bootstrap(config).unwrap();
        assert_eq!(server.host(), "127.0.0.1:9090");
        assert_eq!(server.base_url(), "http://127.0.0.1:9090");

        // The global subscriber is already installed.
        let err = bootstrap(Config::defaults()).unwrap_err();
        assert!(matches!(err, BootstrapError::Telemetry(_)));
    }
}
