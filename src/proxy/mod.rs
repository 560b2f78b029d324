//! Proxy server module

pub mod http_client;
pub mod server;
pub mod tunnel;

// Re-exports
pub use http_client::HttpClient;
pub use server::{handle_request, ProxyServer, ProxyState};
