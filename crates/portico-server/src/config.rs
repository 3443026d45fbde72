//! Server configuration.
//!
//! [`ServerConfig`] holds the `server.*` values the host needs: bind
//! address, public domain, reverse-proxy settings and the transport
//! timeouts. Build it by hand with the builder or read it from a loaded
//! [`Config`](portico_config::Config).
//!
//! # Example
//!
//! ```rust
//! use portico_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .host("0.0.0.0")
//!     .port(8080)
//!     .drain_timeout(Duration::from_secs(10))
//!     .build();
//!
//! assert_eq!(config.host_port(), "0.0.0.0:8080");
//! ```

use std::time::Duration;

use portico_config::{Config, ConfigError};

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default read and write timeout in seconds.
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;

/// Default keep-alive idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 20;

/// Default graceful drain deadline in seconds.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 5;

/// Reverse-proxy settings used to build the proxy base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Public host name.
    pub host: String,
    /// `http` or `https`.
    pub protocol: String,
    /// Public port. `None` means the protocol's default port.
    pub port: Option<u16>,
    /// Path prefix under which the application is mounted.
    pub base: String,
}

impl ProxyConfig {
    /// Creates proxy settings for `host` over plain HTTP on the default port.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            protocol: "http".to_string(),
            port: None,
            base: String::new(),
        }
    }
}

/// Server configuration.
///
/// Timeouts are `None` when disabled.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    domain: String,
    proxy: Option<ProxyConfig>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    drain_timeout: Duration,
}

impl ServerConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Reads the `server.*` section of a loaded configuration.
    ///
    /// Timeouts are whole seconds; `0` disables the timeout. Missing keys
    /// keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the port or a proxy value
    /// is out of range.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(host) = config.get_str("server.host") {
            builder = builder.host(host);
        }
        if let Some(port) = config.get_uint("server.port") {
            builder = builder.port(to_port("server.port", port)?);
        }
        if let Some(domain) = config.get_str("server.domain") {
            builder = builder.domain(domain);
        }
        if let Some(secs) = config.get_uint("server.readTimeout") {
            builder = builder.read_timeout(seconds(secs));
        }
        if let Some(secs) = config.get_uint("server.writeTimeout") {
            builder = builder.write_timeout(seconds(secs));
        }
        if let Some(secs) = config.get_uint("server.idleTimeout") {
            builder = builder.idle_timeout(seconds(secs));
        }

        if let Some(host) = config.get_str("server.proxy.host") {
            let mut proxy = ProxyConfig::new(host);
            if let Some(protocol) = config.get_str("server.proxy.protocol") {
                proxy.protocol = protocol.to_string();
            }
            if let Some(port) = config.get_uint("server.proxy.port") {
                proxy.port = Some(to_port("server.proxy.port", port)?);
            }
            if let Some(base) = config.get_str("server.proxy.base") {
                proxy.base = base.to_string();
            }
            builder = builder.proxy(proxy);
        }

        Ok(builder.build())
    }

    /// Bind host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bind port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` bind address.
    #[must_use]
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public domain. Empty when unset.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Reverse-proxy settings.
    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// Bound on reading request headers and body.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Bound on handler execution.
    #[must_use]
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// Keep-alive switch. `None` disables keep-alive; any value enables it.
    ///
    /// The duration itself is not enforced: hyper's HTTP/1 connection has
    /// no separate idle timer, so an idle keep-alive connection is bounded
    /// by [`read_timeout`](Self::read_timeout) while it waits for the next
    /// request's headers.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// How long `stop` waits for in-flight connections before closing them.
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn to_port(key: &str, value: u64) -> Result<u16, ConfigError> {
    u16::try_from(value).map_err(|_| ConfigError::invalid_value(key, format!("{value} is not a valid port")))
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    host: String,
    port: u16,
    domain: String,
    proxy: Option<ProxyConfig>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    drain_timeout: Duration,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfigBuilder {
    /// Creates a builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            domain: String::new(),
            proxy: None,
            read_timeout: seconds(DEFAULT_IO_TIMEOUT_SECS),
            write_timeout: seconds(DEFAULT_IO_TIMEOUT_SECS),
            idle_timeout: seconds(DEFAULT_IDLE_TIMEOUT_SECS),
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
        }
    }

    /// Sets the bind host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the bind port. `0` picks an ephemeral port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the public domain used in the base URL.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets reverse-proxy settings.
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the read timeout. `None` disables it.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the handler timeout. `None` disables it.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Enables keep-alive (`Some`) or disables it (`None`). See
    /// [`ServerConfig::idle_timeout`] for which timeout bounds idle
    /// connections.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the graceful drain deadline.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            domain: self.domain,
            proxy: self.proxy,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            idle_timeout: self.idle_timeout,
            drain_timeout: self.drain_timeout,
        }
    }
}
