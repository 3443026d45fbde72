//! Property tests for URL derivation.

use portico_server::{address, ProxyConfig, ServerConfig};
use proptest::prelude::*;

fn hostname() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,10}(\\.[a-z]{2,5}){0,2}"
}

proptest! {
    #[test]
    fn prop_base_url_never_shows_port_80(host in hostname(), port in any::<u16>()) {
        let config = ServerConfig::builder().host(host).port(port).build();
        let url = address::base_url(&config);

        prop_assert!(url.starts_with("http://"));
        prop_assert!(!url.ends_with(":80"));
        if port != 80 {
            let suffix = format!(":{port}");
            prop_assert!(url.ends_with(&suffix));
        }
    }

    #[test]
    fn prop_domain_wins_over_host(host in hostname(), domain in hostname(), port in any::<u16>()) {
        let config = ServerConfig::builder()
            .host(host)
            .domain(domain.clone())
            .port(port)
            .build();
        let prefix = format!("http://{domain}");
        prop_assert!(address::base_url(&config).starts_with(&prefix));
    }

    #[test]
    fn prop_proxy_default_port_is_hidden(
        host in hostname(),
        https in any::<bool>(),
        base in "(/[a-z]{1,6}){0,2}",
    ) {
        let protocol = if https { "https" } else { "http" };
        let mut proxy = ProxyConfig::new(host.clone());
        proxy.protocol = protocol.to_string();
        proxy.port = Some(if https { 443 } else { 80 });
        proxy.base = base.clone();

        let config = ServerConfig::builder().proxy(proxy).build();
        prop_assert_eq!(
            address::proxy_base_url(&config),
            format!("{protocol}://{host}{base}")
        );
    }

    #[test]
    fn prop_host_joins_host_and_port(host in hostname(), port in any::<u16>()) {
        let config = ServerConfig::builder().host(host.clone()).port(port).build();
        prop_assert_eq!(address::host(&config), format!("{host}:{port}"));
    }
}
