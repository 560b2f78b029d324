//! HTTP utility functions

use hyper::{Body, HeaderMap, Response, StatusCode};

/// Fixed HTML fragment served for requests to a blocked host
pub const BLOCKED_PAGE: &str = r#"
<html>
	<body>
		<h1>This host has been blocked!</h1>
	</body>
</html>"#;

/// Check if a header is a hop-by-hop header
pub fn is_hop_by_hop_header(name: &str) -> bool {
    let hop_by_hop_headers = [
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
    ];

    hop_by_hop_headers.contains(&name.to_lowercase().as_str())
}

/// Parse host and port from a CONNECT target
pub fn parse_connect_target(target: &str) -> Result<(String, u16), String> {
    let parts: Vec<&str> = target.split(':').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid CONNECT target format: {}", target));
    }

    let host = parts[0].to_string();
    let port = parts[1].parse::<u16>().unwrap_or(443);

    Ok((host, port))
}

/// Build a plain-text error response
pub fn build_error_response(status: StatusCode, message: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(message.to_string()))
        .unwrap_or_else(|_| Response::new(Body::from(message.to_string())))
}

/// Build the fixed 404 response served for a blocked host
pub fn build_blocked_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("content-type", "text/html; charset=utf-8")
        .body(Body::from(BLOCKED_PAGE))
        .unwrap_or_else(|_| Response::new(Body::from(BLOCKED_PAGE)))
}

/// Sum the wire size of a header map: the byte lengths of every name and
/// value, the same accounting applied to cached and relayed responses
pub fn header_bytes(headers: &HeaderMap) -> u64 {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().len() + value.len()) as u64)
        .sum()
}
