//! Upstream HTTP client management
//!
//! One shared client with connection pooling serves every forwarded
//! fetch; per-request client construction is the bottleneck this avoids.

use crate::config::HttpClientConfig;
use hyper::{Body, Client};
use hyper_rustls::HttpsConnectorBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

type PooledClient = Client<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>, Body>;

/// Shared upstream client with connection pooling. The connector accepts
/// both `http` and `https` targets, so one pool covers every origin.
pub struct HttpClient {
    client: Arc<PooledClient>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a client from the loaded proxy configuration
    pub fn from_config(config: &HttpClientConfig) -> Self {
        info!("🚀 Initializing upstream HTTP client with connection pooling");
        debug!("   Max idle connections per host: {}", config.max_idle_per_host);
        debug!("   Idle timeout: {}s", config.idle_timeout_secs);
        debug!("   Connect timeout: {}s", config.connect_timeout_secs);

        let mut http_connector = hyper::client::HttpConnector::new();
        http_connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        http_connector.set_nodelay(true);
        http_connector.set_reuse_address(true);
        if config.tcp_keepalive {
            http_connector
                .set_keepalive(Some(Duration::from_secs(config.tcp_keepalive_interval_secs)));
        }
        http_connector.enforce_http(false);

        let https_connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(https_connector);

        Self {
            client: Arc::new(client),
            config: config.clone(),
        }
    }

    /// The shared pooled client
    pub fn client(&self) -> Arc<PooledClient> {
        Arc::clone(&self.client)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::from_config(&HttpClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_default_config() {
        let client = HttpClient::default();
        assert_eq!(client.config().max_idle_per_host, 50);
        assert_eq!(client.config().idle_timeout_secs, 90);
    }
}
