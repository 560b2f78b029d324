//! Per-host latency and bandwidth telemetry

use crate::models::{BandwidthRow, TimingRow};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Per-host response-time samples, split by cache lane
#[derive(Debug, Default)]
struct TimingSeries {
    uncached: Vec<Duration>,
    cached: Vec<Duration>,
}

/// Per-host derived bandwidth samples in kB/s, split by cache lane
#[derive(Debug, Default)]
struct BandwidthSeries {
    uncached: Vec<f64>,
    cached: Vec<f64>,
}

#[derive(Debug, Default)]
struct PerfMaps {
    times: HashMap<String, TimingSeries>,
    bandwidths: HashMap<String, BandwidthSeries>,
}

/// Concurrency-safe aggregator of how the proxy is performing, per host.
///
/// Bandwidth samples are `(content_length in kB) / (elapsed in seconds)`.
/// The division is not guarded here: callers must not record
/// zero-duration samples. Near-zero elapsed time for a tiny cached body
/// is a legitimate fast path, so the aggregator does not clamp.
pub struct PerfRegistry {
    // One lock guards both maps so a timing sample and its derived
    // bandwidth sample land atomically.
    inner: Mutex<PerfMaps>,
}

impl PerfRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PerfMaps::default()),
        }
    }

    /// Record a sample for a response that went to the origin
    pub fn record_uncached(&self, host: &str, elapsed: Duration, content_length: u64) {
        let bandwidth = bandwidth_kbps(content_length, elapsed);
        let mut maps = self.inner.lock().unwrap();
        maps.times
            .entry(host.to_string())
            .or_default()
            .uncached
            .push(elapsed);
        maps.bandwidths
            .entry(host.to_string())
            .or_default()
            .uncached
            .push(bandwidth);
        debug!(
            "Recorded uncached sample for {}: {:?}, {} bytes",
            host, elapsed, content_length
        );
    }

    /// Record a sample for a response served from the cache
    pub fn record_cached(&self, host: &str, elapsed: Duration, content_length: u64) {
        let bandwidth = bandwidth_kbps(content_length, elapsed);
        let mut maps = self.inner.lock().unwrap();
        maps.times
            .entry(host.to_string())
            .or_default()
            .cached
            .push(elapsed);
        maps.bandwidths
            .entry(host.to_string())
            .or_default()
            .cached
            .push(bandwidth);
        debug!(
            "Recorded cached sample for {}: {:?}, {} bytes",
            host, elapsed, content_length
        );
    }

    /// Average response times per host, in whole milliseconds.
    /// A lane with no samples reports `None` ("unused"), never zero.
    pub fn average_times(&self) -> Vec<TimingRow> {
        let maps = self.inner.lock().unwrap();
        maps.times
            .iter()
            .map(|(host, series)| TimingRow {
                host: host.clone(),
                uncached_ms: mean_millis(&series.uncached),
                cached_ms: mean_millis(&series.cached),
            })
            .collect()
    }

    /// Average bandwidths per host in kB/s, same lane policy as times
    pub fn average_bandwidths(&self) -> Vec<BandwidthRow> {
        let maps = self.inner.lock().unwrap();
        maps.bandwidths
            .iter()
            .map(|(host, series)| BandwidthRow {
                host: host.clone(),
                uncached_kbps: mean(&series.uncached),
                cached_kbps: mean(&series.cached),
            })
            .collect()
    }
}

impl Default for PerfRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Bandwidth in kB/s: truncating kB division, then seconds
fn bandwidth_kbps(content_length: u64, elapsed: Duration) -> f64 {
    (content_length / 1000) as f64 / elapsed.as_secs_f64()
}

fn mean_millis(samples: &[Duration]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    let total: u128 = samples.iter().map(|d| d.as_millis()).sum();
    Some((total / samples.len() as u128) as u64)
}

fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}
