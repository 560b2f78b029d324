//! Proxy server configuration settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main configuration for the proxy server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Server listening address
    pub listen_addr: SocketAddr,

    /// Log level configuration
    pub log_level: String,

    /// Response cache configuration
    pub cache: CacheConfig,

    /// Upstream HTTP client configuration
    pub http_client: HttpClientConfig,

    /// Operator console configuration
    pub console: ConsoleConfig,
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached response stays eligible for serving
    pub ttl_secs: u64,

    /// Seconds between eviction sweeps
    pub sweep_interval_secs: u64,
}

/// Upstream HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Maximum idle connections per host
    pub max_idle_per_host: usize,

    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Enable TCP keepalive
    pub tcp_keepalive: bool,

    /// TCP keepalive interval in seconds
    pub tcp_keepalive_interval_secs: u64,
}

/// Operator console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Read operator commands from stdin
    pub enabled: bool,

    /// User-Agent marker that triggers the content preview sink
    pub preview_user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".parse().unwrap(),
            log_level: "info".to_string(),
            cache: CacheConfig::default(),
            http_client: HttpClientConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10,
            sweep_interval_secs: 1,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 50,
            idle_timeout_secs: 90,
            connect_timeout_secs: 10,
            tcp_keepalive: true,
            tcp_keepalive_interval_secs: 30,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preview_user_agent: "curl".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ProxyConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load configuration from `config.yml` (falling back to defaults when
    /// the file is absent) with environment variable overrides applied
    pub fn load_config(config_path: Option<&Path>) -> Result<Self> {
        let default_path = Path::new("config.yml");
        let path = config_path.unwrap_or(default_path);

        let mut config = if path.exists() {
            Self::from_yaml_file(path)?
        } else if config_path.is_some() {
            return Err(anyhow::anyhow!(
                "Config file '{}' not found",
                path.display()
            ));
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Override settings from environment variables for development/testing
    fn apply_env_overrides(&mut self) {
        if let Ok(addr_str) = std::env::var("PROXY_LISTEN_ADDR") {
            if let Ok(addr) = addr_str.parse() {
                self.listen_addr = addr;
            }
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }

        if let Ok(ttl) = std::env::var("PROXY_CACHE_TTL_SECS") {
            if let Ok(ttl) = ttl.parse() {
                self.cache.ttl_secs = ttl;
            }
        }

        if let Ok(interval) = std::env::var("PROXY_CACHE_SWEEP_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse() {
                self.cache.sweep_interval_secs = interval;
            }
        }

        if let Ok(max_idle) = std::env::var("PROXY_MAX_IDLE_PER_HOST") {
            if let Ok(max_idle) = max_idle.parse() {
                self.http_client.max_idle_per_host = max_idle;
            }
        }

        if let Ok(timeout) = std::env::var("PROXY_IDLE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.http_client.idle_timeout_secs = timeout;
            }
        }

        if let Ok(timeout) = std::env::var("PROXY_CONNECT_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.http_client.connect_timeout_secs = timeout;
            }
        }

        if let Ok(enabled) = std::env::var("PROXY_CONSOLE_ENABLED") {
            self.console.enabled = enabled.to_lowercase() == "true";
        }

        if let Ok(agent) = std::env::var("PROXY_PREVIEW_USER_AGENT") {
            self.console.preview_user_agent = agent;
        }
    }
}
