//! Logging utility functions for proxy operations

use crate::log_debug;
use hyper::StatusCode;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Log incoming request information
pub fn log_incoming_request(method: &str, uri: &str, remote_addr: &SocketAddr) {
    if method == "CONNECT" {
        info!("🔐 Connection request: {} from {}", uri, remote_addr.ip());
    } else {
        info!("📥 {} {} from {}", method, uri, remote_addr.ip());
    }
}

/// Log a request rejected by the blocklist
pub fn log_blocked(host: &str) {
    warn!("⛔ Access to {} has been blocked", host);
}

/// Log a response served from the cache
pub fn log_cache_hit(url: &str) {
    info!("📦 Used cached response to serve {}", url);
}

/// Log successful tunnel establishment
pub fn log_tunnel_established(host: &str, port: u16, connect_time: u128) {
    info!("✅ Tunnel established to {}:{} ({}ms)", host, port, connect_time);
}

/// Log a failed tunnel dial
pub fn log_tunnel_failure(target: &str, connect_time: u128, error: &str) {
    warn!("❌ CONNECT failed to {} ({}ms): {}", target, connect_time, error);
}

/// Log HTTP forward success
pub fn log_forward_success(method: &str, url: &str, status: StatusCode, total_time: u128) {
    info!("✅ {} {} → {} ({}ms)", method, url, status, total_time);
    log_debug!(
        "✅ FORWARD SUCCESS:\n  Method: {}\n  URL: {}\n  Status: {}\n  Time: {}ms",
        method,
        url,
        status,
        total_time
    );
}

/// Log HTTP forward failure
pub fn log_forward_failure(method: &str, url: &str, total_time: u128, error: &dyn std::fmt::Display) {
    warn!("❌ {} {} → ERROR ({}ms): {}", method, url, total_time, error);
}
