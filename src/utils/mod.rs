//! Utility functions for the proxy server

pub mod http;
pub mod logging;
pub mod url;

pub use http::*;
pub use logging::*;
pub use url::*;
