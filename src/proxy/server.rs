//! Proxy server and request dispatch engine

use crate::config::ProxyConfig;
use crate::error::Error;
use crate::log_request;
use crate::models::{DispatchDecision, FailureKind, RequestSummary};
use crate::notify::{ContentSink, PreviewSink};
use crate::proxy::http_client::HttpClient;
use crate::proxy::tunnel;
use crate::store::{Blocklist, PerfRegistry, ResponseCache};
use crate::utils::{
    build_blocked_response, build_error_response, cache_key, header_bytes, host_of_uri,
    is_hop_by_hop_header, log_blocked, log_cache_hit, log_forward_failure, log_forward_success,
    log_incoming_request,
};
use crate::{log_error, log_info};
use anyhow::{Context, Result};
use hyper::server::conn::AddrIncoming;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, HeaderMap, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Everything a request handler needs: the three stores, the pooled
/// upstream client, and the preview sink. The dispatch engine itself
/// holds no authoritative state.
pub struct ProxyState {
    pub blocklist: Blocklist,
    pub cache: Arc<ResponseCache>,
    pub perf: PerfRegistry,
    pub client: HttpClient,
    pub sink: Arc<dyn ContentSink>,
    pub preview_user_agent: String,
}

impl ProxyState {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            blocklist: Blocklist::new(),
            cache: Arc::new(ResponseCache::new(config.cache.ttl())),
            perf: PerfRegistry::new(),
            client: HttpClient::from_config(&config.http_client),
            sink: Arc::new(PreviewSink),
            preview_user_agent: config.console.preview_user_agent.clone(),
        }
    }
}

pub struct ProxyServer {
    listen_addr: SocketAddr,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    pub fn new(listen_addr: SocketAddr, state: Arc<ProxyState>) -> Self {
        Self { listen_addr, state }
    }

    /// Bind the listening address and serve until the process exits.
    /// A bind failure is the only fatal error.
    pub async fn start(self) -> Result<()> {
        let incoming = AddrIncoming::bind(&self.listen_addr)
            .with_context(|| format!("failed to bind {}", self.listen_addr))?;
        self.serve(incoming).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve(self, incoming: AddrIncoming) -> Result<()> {
        let local_addr = incoming.local_addr();
        log_info!("Listening on {}...", local_addr);

        let state = self.state;
        let make_svc = make_service_fn(move |conn: &hyper::server::conn::AddrStream| {
            let remote_addr = conn.remote_addr();
            let state = Arc::clone(&state);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handle_request(req, remote_addr, state).await }
                }))
            }
        });

        if let Err(e) = Server::builder(incoming).serve(make_svc).await {
            error!("Server error: {}", e);
            log_error!("Server error: {}", e);
        }

        Ok(())
    }
}

/// Handle one inbound proxy request.
///
/// The stage order is a correctness requirement: blocklist first (no
/// network activity, no telemetry for a rejected request), then the
/// cache, then tunnel-or-forward, and telemetry strictly last so the
/// sample lands in the lane matching the real outcome.
pub async fn handle_request(
    req: Request<Body>,
    remote_addr: SocketAddr,
    state: Arc<ProxyState>,
) -> Result<Response<Body>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    log_incoming_request(method.as_str(), &uri.to_string(), &remote_addr);

    let host = host_of_uri(&uri).unwrap_or_default();
    let key = cache_key(&uri);
    let wants_preview = wants_preview(&req, &state.preview_user_agent);

    let (response, decision) = if state.blocklist.is_blocked(&uri) {
        log_blocked(uri.host().unwrap_or("<unknown host>"));
        (build_blocked_response(), DispatchDecision::Blocked)
    } else if let Some(entry) = state.cache.get(&key) {
        serve_cached(&state, &uri, entry, wants_preview).await
    } else if method == Method::CONNECT {
        tunnel::establish(req).await
    } else {
        forward(req, &state, key, wants_preview).await
    };

    // Telemetry reflects the real outcome: blocked and failed requests
    // contribute no sample, tunnels carry no known byte count.
    let elapsed = started.elapsed();
    match decision {
        DispatchDecision::CacheHit { bytes } if bytes > 0 => {
            state.perf.record_cached(&host, elapsed, bytes);
        }
        DispatchDecision::ForwardedFetch { bytes } if bytes > 0 => {
            state.perf.record_uncached(&host, elapsed, bytes);
        }
        _ => {}
    }

    Ok(response)
}

/// Whether the served body should be handed to the preview sink
fn wants_preview(req: &Request<Body>, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    req.headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(|agent| agent.contains(marker))
        .unwrap_or(false)
}

/// Serve a captured response from the cache instead of fetching
async fn serve_cached(
    state: &ProxyState,
    uri: &hyper::Uri,
    entry: crate::models::CachedResponse,
    preview: bool,
) -> (Response<Body>, DispatchDecision) {
    log_cache_hit(&uri.to_string());

    let transferred = entry.body.len() as u64 + header_bytes(&entry.headers);

    if preview {
        let text = String::from_utf8_lossy(&entry.body).to_string();
        if let Err(e) = state.sink.display(&text).await {
            log_error!("{}", e);
            return (
                build_error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
                DispatchDecision::Failed(FailureKind::Preview),
            );
        }
    }

    let mut builder = Response::builder().status(entry.status);
    for (name, value) in entry.headers.iter() {
        builder = builder.header(name, value);
    }

    match builder.body(Body::from(entry.body.clone())) {
        Ok(response) => (
            response,
            DispatchDecision::CacheHit {
                bytes: transferred,
            },
        ),
        Err(e) => {
            let err = Error::ClientWrite(e.to_string());
            log_error!("{}", err);
            (
                build_error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
                DispatchDecision::Failed(FailureKind::ClientWrite),
            )
        }
    }
}

/// Perform the outbound fetch on behalf of the client, relay the
/// response, and capture it into the cache under the exact URL key
async fn forward(
    req: Request<Body>,
    state: &ProxyState,
    key: String,
    preview: bool,
) -> (Response<Body>, DispatchDecision) {
    let started = Instant::now();
    let method = req.method().to_string();
    let url = req.uri().to_string();
    let (parts, body) = req.into_parts();

    // The inbound body is buffered so it can be echoed into the request
    // summary and reissued upstream.
    let body_bytes = match hyper::body::to_bytes(body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = Error::BodyRead(e.to_string());
            log_forward_failure(&method, &url, started.elapsed().as_millis(), &err);
            return (
                build_error_response(StatusCode::SERVICE_UNAVAILABLE, &err.to_string()),
                DispatchDecision::Failed(FailureKind::BodyRead),
            );
        }
    };

    let summary =
        RequestSummary::new(&parts.method, &parts.uri, parts.version, &parts.headers, Some(&body_bytes));
    log_request!(&summary);

    // Building a fresh request drops the request-target echo; hop-by-hop
    // headers stay with this connection.
    let mut builder = Request::builder().method(parts.method).uri(parts.uri);
    for (name, value) in parts.headers.iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            builder = builder.header(name, value);
        }
    }
    let outbound = match builder.body(Body::from(body_bytes)) {
        Ok(request) => request,
        Err(e) => {
            let err = Error::UpstreamFetch(e.to_string());
            log_forward_failure(&method, &url, started.elapsed().as_millis(), &err);
            return (
                build_error_response(StatusCode::SERVICE_UNAVAILABLE, &err.to_string()),
                DispatchDecision::Failed(FailureKind::UpstreamFetch),
            );
        }
    };

    let client = state.client.client();
    let upstream = match client.request(outbound).await {
        Ok(response) => response,
        Err(e) => {
            let err = Error::UpstreamFetch(e.to_string());
            log_forward_failure(&method, &url, started.elapsed().as_millis(), &err);
            return (
                build_error_response(StatusCode::SERVICE_UNAVAILABLE, &err.to_string()),
                DispatchDecision::Failed(FailureKind::UpstreamFetch),
            );
        }
    };

    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            headers.append(name, value.clone());
        }
    }

    let response_body = match hyper::body::to_bytes(upstream.into_body()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = Error::BodyRead(e.to_string());
            log_forward_failure(&method, &url, started.elapsed().as_millis(), &err);
            return (
                build_error_response(StatusCode::SERVICE_UNAVAILABLE, &err.to_string()),
                DispatchDecision::Failed(FailureKind::BodyRead),
            );
        }
    };

    // Unconditional capture: a refetch of the same key overwrites the
    // prior entry with a fresh timestamp.
    state
        .cache
        .put(key, status, headers.clone(), response_body.clone());

    let transferred = response_body.len() as u64 + header_bytes(&headers);

    if preview {
        let text = String::from_utf8_lossy(&response_body).to_string();
        if let Err(e) = state.sink.display(&text).await {
            log_error!("{}", e);
            return (
                build_error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
                DispatchDecision::Failed(FailureKind::Preview),
            );
        }
    }

    let mut builder = Response::builder().status(status);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }

    match builder.body(Body::from(response_body)) {
        Ok(response) => {
            log_forward_success(&method, &url, status, started.elapsed().as_millis());
            (
                response,
                DispatchDecision::ForwardedFetch {
                    bytes: transferred,
                },
            )
        }
        Err(e) => {
            let err = Error::ClientWrite(e.to_string());
            log_error!("{}", err);
            (
                build_error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
                DispatchDecision::Failed(FailureKind::ClientWrite),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, ConsoleConfig, HttpClientConfig};
    use crate::error::Error;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_state() -> Arc<ProxyState> {
        Arc::new(ProxyState::from_config(&ProxyConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            cache: CacheConfig::default(),
            http_client: HttpClientConfig::default(),
            console: ConsoleConfig::default(),
        }))
    }

    fn client_addr() -> SocketAddr {
        "127.0.0.1:45000".parse().unwrap()
    }

    /// Spawn a tiny origin server; returns its base URL
    async fn spawn_origin(body: &'static str) -> String {
        let incoming = AddrIncoming::bind(&"127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = incoming.local_addr();
        let make_svc = make_service_fn(move |_| async move {
            Ok::<_, Infallible>(service_fn(move |_req| async move {
                Ok::<_, Infallible>(
                    Response::builder()
                        .status(StatusCode::OK)
                        .header("content-type", "text/plain")
                        .body(Body::from(body))
                        .unwrap(),
                )
            }))
        });
        tokio::spawn(async move {
            let _ = Server::builder(incoming).serve(make_svc).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_blocked_host_gets_block_page_and_no_telemetry() {
        let state = test_state();
        state.blocklist.add("blocked.com").unwrap();

        let req = Request::builder()
            .method(Method::GET)
            .uri("http://sub.blocked.com/page")
            .body(Body::empty())
            .unwrap();

        let response = handle_request(req, client_addr(), Arc::clone(&state))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("blocked"));

        assert!(state.perf.average_times().is_empty());
        assert!(state.cache.list().is_empty());
    }

    #[tokio::test]
    async fn test_forward_then_cache_hit() {
        let origin = spawn_origin("hello from origin").await;
        let state = test_state();
        let url = format!("{}/greeting", origin);

        let req = Request::builder()
            .method(Method::GET)
            .uri(&url)
            .body(Body::empty())
            .unwrap();
        let response = handle_request(req, client_addr(), Arc::clone(&state))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"hello from origin"));

        // One uncached sample, one cache entry
        let rows = state.perf.average_times();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].uncached_ms.is_some());
        assert_eq!(rows[0].cached_ms, None);
        assert_eq!(state.cache.list().len(), 1);

        // The repeat within the TTL is served from the cache
        let req = Request::builder()
            .method(Method::GET)
            .uri(&url)
            .body(Body::empty())
            .unwrap();
        let response = handle_request(req, client_addr(), Arc::clone(&state))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"hello from origin"));

        let rows = state.perf.average_times();
        assert!(rows[0].cached_ms.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_service_unavailable() {
        let state = test_state();
        // Nothing listens on this port
        let req = Request::builder()
            .method(Method::GET)
            .uri("http://127.0.0.1:1/unreachable")
            .body(Body::empty())
            .unwrap();
        let response = handle_request(req, client_addr(), Arc::clone(&state))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(state.perf.average_times().is_empty());
        assert!(state.cache.list().is_empty());
    }

    struct FailingSink(AtomicUsize);

    #[async_trait]
    impl ContentSink for FailingSink {
        async fn display(&self, _body: &str) -> crate::error::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::Preview("no display attached".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failing_preview_sink_maps_to_internal_error() {
        let origin = spawn_origin("preview me").await;
        let state = Arc::new(ProxyState {
            blocklist: Blocklist::new(),
            cache: Arc::new(ResponseCache::new(std::time::Duration::from_secs(10))),
            perf: PerfRegistry::new(),
            client: HttpClient::default(),
            sink: Arc::new(FailingSink(AtomicUsize::new(0))),
            preview_user_agent: "curl".to_string(),
        });

        let req = Request::builder()
            .method(Method::GET)
            .uri(format!("{}/page", origin))
            .header("user-agent", "curl/8.4.0")
            .body(Body::empty())
            .unwrap();
        let response = handle_request(req, client_addr(), Arc::clone(&state))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // A failed preview discards the telemetry sample
        assert!(state.perf.average_times().is_empty());
    }

    #[tokio::test]
    async fn test_connect_tunnel_end_to_end() {
        // Echo server standing in for the remote origin
        let echo = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let echo_addr = echo.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match echo.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                        if socket.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        // Proxy under test
        let incoming = AddrIncoming::bind(&"127.0.0.1:0".parse().unwrap()).unwrap();
        let proxy_addr = incoming.local_addr();
        let server = ProxyServer::new(proxy_addr, test_state());
        tokio::spawn(async move {
            let _ = server.serve(incoming).await;
        });

        let mut stream = tokio::net::TcpStream::connect(proxy_addr).await.unwrap();
        let connect = format!(
            "CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n",
            target = echo_addr
        );
        stream.write_all(connect.as_bytes()).await.unwrap();

        // Read the 200 response that precedes the raw tunnel
        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        while !response.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).await.unwrap();
            response.push(byte[0]);
        }
        let head = String::from_utf8_lossy(&response);
        assert!(head.starts_with("HTTP/1.1 200"), "unexpected response: {}", head);

        // Bytes flow both directions through the tunnel
        stream.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ping");
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_target_is_not_found() {
        let state = test_state();
        let req = Request::builder()
            .method(Method::CONNECT)
            .uri("127.0.0.1:1")
            .body(Body::empty())
            .unwrap();
        let response = handle_request(req, client_addr(), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
