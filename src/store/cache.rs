//! Short-lived response cache with background eviction

use crate::models::CachedResponse;
use crate::utils::host_of_cache_key;
use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::info;

/// Concurrency-safe map from exact request URL to a captured response.
///
/// Freshness is enforced solely by the eviction sweep: [`ResponseCache::get`]
/// never checks the TTL inline, so a lookup racing an entry's expiry can
/// still return the stale-but-present value. That relaxed behavior is part
/// of the contract, not a bug.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert a captured response, unconditionally overwriting any
    /// existing entry for `key` with a fresh timestamp
    pub fn put(&self, key: String, status: StatusCode, headers: HeaderMap, body: Bytes) {
        let entry = CachedResponse {
            status,
            headers,
            body,
            cached_at: Instant::now(),
        };
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, entry);
    }

    /// Pure lookup by exact URL key
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Hostnames of all cached entries, for display
    pub fn list(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .keys()
            .map(|key| host_of_cache_key(key))
            .collect()
    }

    /// Remove every entry older than the TTL; returns the removed keys.
    /// The lock is held for the scan only, never across I/O.
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.cached_at) > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired
    }

    /// Spawn the eviction task: a fixed-interval sweep that runs for the
    /// lifetime of the process, independent of any request
    pub fn spawn_evictor(self: Arc<Self>, sweep_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired();
                for key in removed {
                    info!("Removed {} from the cache", host_of_cache_key(&key));
                }
            }
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/html".parse().unwrap());
        headers
    }

    #[test]
    fn test_put_get_round_trip() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        let key = "http://example.com/index.html".to_string();
        cache.put(
            key.clone(),
            StatusCode::OK,
            sample_headers(),
            Bytes::from_static(b"<html>hi</html>"),
        );

        let entry = cache.get(&key).expect("entry should be present");
        assert_eq!(entry.status, StatusCode::OK);
        assert_eq!(entry.headers.get("content-type").unwrap(), "text/html");
        assert_eq!(entry.body, Bytes::from_static(b"<html>hi</html>"));
    }

    #[test]
    fn test_distinct_paths_are_distinct_entries() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        cache.put(
            "http://example.com/a".to_string(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"a"),
        );
        assert!(cache.get("http://example.com/b").is_none());
        assert!(cache.get("http://example.com/a?q=1").is_none());
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        let key = "http://example.com/".to_string();
        cache.put(key.clone(), StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"old"));
        cache.put(key.clone(), StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"new"));
        assert_eq!(cache.get(&key).unwrap().body, Bytes::from_static(b"new"));
    }

    #[test]
    fn test_get_does_not_expire_inline() {
        // Freshness is the sweep's job: an aged entry is still served
        // until the evictor removes it.
        let cache = ResponseCache::new(Duration::from_millis(10));
        let key = "http://example.com/".to_string();
        cache.put(key.clone(), StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"x"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_sweep_removes_only_expired_entries() {
        let cache = ResponseCache::new(Duration::from_millis(40));
        cache.put(
            "http://old.com/".to_string(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"x"),
        );
        std::thread::sleep(Duration::from_millis(60));
        cache.put(
            "http://fresh.com/".to_string(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"y"),
        );

        let removed = cache.sweep_expired();
        assert_eq!(removed, vec!["http://old.com/".to_string()]);
        assert!(cache.get("http://old.com/").is_none());
        assert!(cache.get("http://fresh.com/").is_some());
    }

    #[tokio::test]
    async fn test_evictor_task_purges_expired_entries() {
        let cache = Arc::new(ResponseCache::new(Duration::from_millis(40)));
        let handle = Arc::clone(&cache).spawn_evictor(Duration::from_millis(20));

        cache.put(
            "http://example.com/".to_string(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"x"),
        );
        assert!(cache.get("http://example.com/").is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get("http://example.com/").is_none());
        handle.abort();
    }

    #[test]
    fn test_list_reports_cached_hosts() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        cache.put(
            "http://example.com/index.html".to_string(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"x"),
        );
        assert_eq!(cache.list(), vec!["example.com".to_string()]);
    }
}
