//! Error handling module for the proxy server

use thiserror::Error;

/// Custom error type for the proxy server
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} is already blocked")]
    AlreadyBlocked(String),

    #[error("{0} is already unblocked")]
    NotBlocked(String),

    #[error("failed to reach {target}: {source}")]
    DialFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("hijacking not supported on this connection")]
    HijackUnsupported,

    #[error("tunnel setup failed: {0}")]
    TunnelSetup(String),

    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("failed to read body: {0}")]
    BodyRead(String),

    #[error("failed to write response to client: {0}")]
    ClientWrite(String),

    #[error("content preview failed: {0}")]
    Preview(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for the proxy server
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Config(err.to_string())
    }
}
