//! URL utility functions

use hyper::Uri;
use url::Url;

/// Extract the host of a request URI, covering both absolute-form
/// (`http://host/path`) and authority-form (`host:port`, CONNECT) targets
pub fn host_of_uri(uri: &Uri) -> Option<String> {
    uri.host().map(|h| h.to_string())
}

/// Accept operator input as either a bare host (`example.com`) or a full
/// URL (`http://example.com/page`), yielding the host
pub fn host_from_operator_input(input: &str) -> Result<String, url::ParseError> {
    if input.contains("://") {
        let parsed = Url::parse(input)?;
        match parsed.host_str() {
            Some(host) => Ok(host.to_string()),
            None => Err(url::ParseError::EmptyHost),
        }
    } else {
        Ok(input.to_string())
    }
}

/// Reduce a host to its registrable domain: strip any `:port` suffix,
/// then keep the last two dot-separated labels. `a.b.example.com`,
/// `example.com:8080` and `EXAMPLE.com` all reduce to `example.com`.
///
/// The blocklist applies this identically when blocking and when
/// matching, so subdomain- or port-qualified requests compare against
/// the same canonical form as a bare-domain block entry.
pub fn registrable_domain(host: &str) -> String {
    let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
    if host.contains('.') {
        let labels: Vec<&str> = host.split('.').collect();
        format!("{}.{}", labels[labels.len() - 2], labels[labels.len() - 1])
    } else {
        host
    }
}

/// Build the cache key for a request target. The key covers the full URL
/// identity (scheme, authority, path, query): two requests that differ in
/// path or query are distinct entries even against the same host.
///
/// The rendering is explicit and deterministic so the key contract does
/// not depend on any struct-equality semantics.
pub fn cache_key(uri: &Uri) -> String {
    let scheme = uri.scheme_str().unwrap_or("http");
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or("");
    match uri.query() {
        Some(query) => format!("{}://{}{}?{}", scheme, authority, uri.path(), query),
        None => format!("{}://{}{}", scheme, authority, uri.path()),
    }
}

/// Extract the host component back out of a cache key, for display
pub fn host_of_cache_key(key: &str) -> String {
    let rest = key.split("://").nth(1).unwrap_or(key);
    let end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
    rest[..end].to_string()
}
