//! Operator-maintained host blocklist

use crate::error::{Error, Result};
use crate::utils::{host_of_uri, registrable_domain};
use hyper::Uri;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

/// Concurrency-safe set of blocked registrable domains.
///
/// Entries are normalized with [`registrable_domain`] both when the
/// operator blocks a host and when a request URL is matched, so
/// `block example.com` rejects `a.b.example.com:8080` as well.
pub struct Blocklist {
    hosts: Mutex<HashSet<String>>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self {
            hosts: Mutex::new(HashSet::new()),
        }
    }

    /// Block a host. Fails if its canonical form is already blocked.
    pub fn add(&self, host: &str) -> Result<()> {
        let canonical = registrable_domain(host);
        let mut hosts = self.hosts.lock().unwrap();
        if !hosts.insert(canonical.clone()) {
            return Err(Error::AlreadyBlocked(host.to_string()));
        }
        debug!("Blocked {} (canonical {})", host, canonical);
        Ok(())
    }

    /// Unblock a host. Fails if its canonical form is not blocked.
    pub fn remove(&self, host: &str) -> Result<()> {
        let canonical = registrable_domain(host);
        let mut hosts = self.hosts.lock().unwrap();
        if !hosts.remove(&canonical) {
            return Err(Error::NotBlocked(host.to_string()));
        }
        debug!("Unblocked {} (canonical {})", host, canonical);
        Ok(())
    }

    /// Whether the host of `uri` is blocked
    pub fn is_blocked(&self, uri: &Uri) -> bool {
        let host = match host_of_uri(uri) {
            Some(host) => host,
            None => return false,
        };
        let canonical = registrable_domain(&host);
        self.hosts.lock().unwrap().contains(&canonical)
    }

    /// All blocked hosts, in no particular order
    pub fn list(&self) -> Vec<String> {
        self.hosts.lock().unwrap().iter().cloned().collect()
    }
}

impl Default for Blocklist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_blocked_host_matches_subdomains_and_ports() {
        let blocklist = Blocklist::new();
        blocklist.add("example.com").unwrap();

        assert!(blocklist.is_blocked(&uri("http://example.com/index.html")));
        assert!(blocklist.is_blocked(&uri("http://a.b.example.com/")));
        assert!(blocklist.is_blocked(&uri("http://example.com:8080/page")));
        assert!(blocklist.is_blocked(&uri("example.com:443")));
        assert!(!blocklist.is_blocked(&uri("http://other.com/")));

        blocklist.remove("example.com").unwrap();
        assert!(!blocklist.is_blocked(&uri("http://example.com/index.html")));
    }

    #[test]
    fn test_add_is_normalized_like_queries() {
        let blocklist = Blocklist::new();
        blocklist.add("www.example.com:8080").unwrap();
        assert!(blocklist.is_blocked(&uri("http://example.com/")));
        assert_eq!(blocklist.list(), vec!["example.com".to_string()]);
    }

    #[test]
    fn test_duplicate_add_and_absent_remove() {
        let blocklist = Blocklist::new();
        blocklist.add("example.com").unwrap();
        assert!(matches!(
            blocklist.add("example.com"),
            Err(Error::AlreadyBlocked(_))
        ));
        assert!(matches!(
            blocklist.remove("other.com"),
            Err(Error::NotBlocked(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_mutation_keeps_membership_consistent() {
        let blocklist = Arc::new(Blocklist::new());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let blocklist = Arc::clone(&blocklist);
                tokio::spawn(async move {
                    let host = format!("host{}.com", i);
                    blocklist.add(&host).unwrap();
                    assert!(blocklist.is_blocked(&format!("http://{}/", host).parse().unwrap()));
                    if i % 2 == 0 {
                        blocklist.remove(&host).unwrap();
                    }
                })
            })
            .collect();
        join_all(tasks).await.into_iter().for_each(|r| r.unwrap());

        for i in 0..32 {
            let target = format!("http://host{}.com/", i).parse().unwrap();
            assert_eq!(blocklist.is_blocked(&target), i % 2 != 0);
        }
    }
}
