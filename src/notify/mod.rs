//! Content preview sink
//!
//! After a body is served to a client whose User-Agent carries the
//! configured marker, the dispatch engine hands the body text to a
//! [`ContentSink`] so it can be displayed outside the proxy. The sink is
//! a seam: the engine only knows the trait.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::Write;
use tracing::info;

/// Destination for served response bodies that should be previewed
/// externally. A failed display is reported back to the original client
/// as an internal error.
#[async_trait]
pub trait ContentSink: Send + Sync {
    async fn display(&self, body: &str) -> Result<()>;
}

/// Sink that materializes the body into a persistent temp `.html` file
/// and logs its path for external viewing
pub struct PreviewSink;

#[async_trait]
impl ContentSink for PreviewSink {
    async fn display(&self, body: &str) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("proxy-preview-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| Error::Preview(e.to_string()))?;
        file.write_all(body.as_bytes())
            .map_err(|e| Error::Preview(e.to_string()))?;
        let (_, path) = file.keep().map_err(|e| Error::Preview(e.to_string()))?;
        info!("👁  Preview written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preview_sink_persists_body() {
        let sink = PreviewSink;
        sink.display("<html>preview</html>").await.unwrap();
    }
}
