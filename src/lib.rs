//! Rust Caching Proxy - a forwarding HTTP proxy with host blocking,
//! short-lived response caching, and per-host performance telemetry.
//!
//! The dispatch engine routes every inbound request through the blocklist,
//! the response cache, and then either a CONNECT tunnel or an outbound
//! fetch, recording latency and bandwidth samples along the way.

pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod models;
pub mod notify;
pub mod proxy;
pub mod store;
pub mod utils;

// Re-export commonly used items
pub use config::ProxyConfig;
pub use error::{Error, Result};
pub use logging::{init_logger_with_config, init_logger_with_env, log_debug, log_error, log_info, log_warning};
pub use models::{BandwidthRow, CachedResponse, DispatchDecision, TimingRow};
pub use proxy::{ProxyServer, ProxyState};
pub use store::{Blocklist, PerfRegistry, ResponseCache};
