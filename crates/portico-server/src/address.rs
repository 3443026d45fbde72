//! Base URL derivation.
//!
//! Pure functions over [`ServerConfig`]. The results are computed once
//! when the server is built.

use crate::ServerConfig;

/// Address a wildcard bind is displayed as.
const LOOPBACK: &str = "127.0.0.1";

/// The `host:port` the listener binds to.
#[must_use]
pub fn host(config: &ServerConfig) -> String {
    config.host_port()
}

/// The URL the application is reachable at directly.
///
/// Uses `server.domain` when set, otherwise the bind host with `0.0.0.0`
/// shown as `127.0.0.1`. The port is omitted when it is `80`.
///
/// ```rust
/// use portico_server::{address, ServerConfig};
///
/// let config = ServerConfig::builder().host("0.0.0.0").port(80).build();
/// assert_eq!(address::base_url(&config), "http://127.0.0.1");
///
/// let config = ServerConfig::builder().host("0.0.0.0").port(8080).build();
/// assert_eq!(address::base_url(&config), "http://127.0.0.1:8080");
/// ```
#[must_use]
pub fn base_url(config: &ServerConfig) -> String {
    let host = if config.domain().is_empty() {
        match config.host() {
            "0.0.0.0" => LOOPBACK,
            host => host,
        }
    } else {
        config.domain()
    };

    match config.port() {
        80 => format!("http://{host}"),
        port => format!("http://{host}:{port}"),
    }
}

/// The URL the application is reachable at through the reverse proxy.
///
/// Falls back to [`base_url`] without proxy settings. The port is omitted
/// when it is the protocol's default (`443` for `https`, `80` otherwise)
/// or unset.
///
/// ```rust
/// use portico_server::{address, ProxyConfig, ServerConfig};
///
/// let mut proxy = ProxyConfig::new("example.org");
/// proxy.protocol = "https".into();
/// proxy.port = Some(8443);
/// proxy.base = "/app".into();
///
/// let config = ServerConfig::builder().proxy(proxy).build();
/// assert_eq!(address::proxy_base_url(&config), "https://example.org:8443/app");
/// ```
#[must_use]
pub fn proxy_base_url(config: &ServerConfig) -> String {
    let Some(proxy) = config.proxy() else {
        return base_url(config);
    };

    let default_port = if proxy.protocol == "https" { 443 } else { 80 };
    match proxy.port {
        Some(port) if port != default_port => {
            format!("{}://{}:{}{}", proxy.protocol, proxy.host, port, proxy.base)
        }
        _ => format!("{}://{}{}", proxy.protocol, proxy.host, proxy.base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProxyConfig;

    fn proxy(protocol: &str, port: Option<u16>) -> ProxyConfig {
        ProxyConfig {
            host: "proxy.example.org".to_string(),
            protocol: protocol.to_string(),
            port,
            base: "/base".to_string(),
        }
    }

    #[test]
    fn test_host() {
        let config = ServerConfig::builder().host("10.0.0.2").port(3000).build();
        assert_eq!(host(&config), "10.0.0.2:3000");
    }

    #[test]
    fn test_base_url_wildcard() {
        let config = ServerConfig::builder().host("0.0.0.0").port(80).build();
        assert_eq!(base_url(&config), "http://127.0.0.1");

        let config = ServerConfig::builder().host("0.0.0.0").port(8080).build();
        assert_eq!(base_url(&config), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_base_url_domain_wins() {
        let config = ServerConfig::builder()
            .host("0.0.0.0")
            .domain("portico.dev")
            .port(80)
            .build();
        assert_eq!(base_url(&config), "http://portico.dev");
    }

    #[test]
    fn test_base_url_keeps_other_hosts() {
        let config = ServerConfig::builder().host("192.168.1.4").port(8000).build();
        assert_eq!(base_url(&config), "http://192.168.1.4:8000");
    }

    #[test]
    fn test_proxy_falls_back_to_base() {
        let config = ServerConfig::builder().port(1234).build();
        assert_eq!(proxy_base_url(&config), base_url(&config));
    }

    #[test]
    fn test_proxy_default_ports_hidden() {
        let config = ServerConfig::builder().proxy(proxy("https", Some(443))).build();
        assert_eq!(proxy_base_url(&config), "https://proxy.example.org/base");

        let config = ServerConfig::builder().proxy(proxy("http", Some(80))).build();
        assert_eq!(proxy_base_url(&config), "http://proxy.example.org/base");

        let config = ServerConfig::builder().proxy(proxy("https", None)).build();
        assert_eq!(proxy_base_url(&config), "https://proxy.example.org/base");
    }

    #[test]
    fn test_proxy_cross_scheme_port_shown() {
        let config = ServerConfig::builder().proxy(proxy("https", Some(80))).build();
        assert_eq!(proxy_base_url(&config), "https://proxy.example.org:80/base");

        let config = ServerConfig::builder().proxy(proxy("http", Some(443))).build();
        assert_eq!(proxy_base_url(&config), "http://proxy.example.org:443/base");
    }
}
