use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode, Uri, Version};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// Summary of an inbound request, rendered into the log stream
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
    pub version: String,
    pub host: Option<String>,
    pub headers: HashMap<String, String>,
    /// Decoded form fields for POST bodies, empty otherwise
    pub form_data: HashMap<String, String>,
}

impl RequestSummary {
    /// Build a summary from the pieces of a request. `body` is only
    /// consulted for POST form payloads.
    pub fn new(
        method: &Method,
        uri: &Uri,
        version: Version,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Self {
        let mut header_map = HashMap::new();
        for (name, value) in headers {
            if let Ok(value_str) = value.to_str() {
                header_map.insert(name.to_string().to_lowercase(), value_str.to_string());
            }
        }

        let host = uri
            .host()
            .map(|h| h.to_string())
            .or_else(|| header_map.get("host").cloned());

        let mut form_data = HashMap::new();
        if method == Method::POST {
            let is_form = header_map
                .get("content-type")
                .map(|ct| ct.contains("application/x-www-form-urlencoded"))
                .unwrap_or(false);
            if is_form {
                if let Some(bytes) = body {
                    for (key, value) in form_urlencoded::parse(bytes) {
                        form_data.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }

        Self {
            method: method.to_string(),
            url: uri.to_string(),
            version: format!("{:?}", version),
            host,
            headers: header_map,
            form_data,
        }
    }
}

/// A captured upstream response owned by the cache store
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Insertion time, compared against the TTL by the eviction sweep
    pub cached_at: Instant,
}

/// Which failure ended a request, for logging and response mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Dial,
    Hijack,
    TunnelSetup,
    UpstreamFetch,
    BodyRead,
    ClientWrite,
    Preview,
}

/// Outcome of one pass through the dispatch engine. Computed once per
/// request; decides which telemetry lane (if any) receives a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    Blocked,
    CacheHit { bytes: u64 },
    TunnelEstablished,
    ForwardedFetch { bytes: u64 },
    Failed(FailureKind),
}

/// Per-host average response times in whole milliseconds.
/// `None` means the lane has no samples ("unused"), never a measured zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRow {
    pub host: String,
    pub uncached_ms: Option<u64>,
    pub cached_ms: Option<u64>,
}

/// Per-host average bandwidths in kB/s, same lane policy as [`TimingRow`]
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthRow {
    pub host: String,
    pub uncached_kbps: Option<f64>,
    pub cached_kbps: Option<f64>,
}
