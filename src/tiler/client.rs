use crate::transport::{Transport, TransportError};
use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long colormap documents are reused before being fetched again.
pub const DOCUMENT_TTL: Duration = Duration::from_secs(60 * 60);

/// Client for the raster service: band statistics and colormap tables.
pub struct TilerClient {
    pub(super) base: String,
    pub(super) transport: Arc<dyn Transport>,
    documents: Cache<String, Arc<Value>>,
}

impl TilerClient {
    pub fn new(base: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let base: String = base.into();
        let documents = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(DOCUMENT_TTL)
            .build();
        Self {
            base: base.trim_end_matches('/').to_string(),
            transport,
            documents,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// GET a JSON document, answering repeats from the cache.
    pub(super) async fn get_cached(&self, url: &str) -> Result<Arc<Value>, TransportError> {
        if let Some(doc) = self.documents.get(url).await {
            return Ok(doc);
        }

        let doc = Arc::new(self.transport.get_json(url).await?);
        debug!(url = %url, "Loaded raster service document");
        self.documents.insert(url.to_string(), doc.clone()).await;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_documents_are_fetched_once() {
        let mock = Arc::new(MockTransport::new().with_json("http://tiler/colorMaps", json!({})));
        let client = TilerClient::new("http://tiler/", mock.clone());
        assert_eq!(client.base(), "http://tiler");

        client.get_cached("http://tiler/colorMaps").await.unwrap();
        client.get_cached("http://tiler/colorMaps").await.unwrap();
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mock = Arc::new(MockTransport::new().with_script(
            "http://tiler/colorMaps",
            vec![Err(503), Ok(json!({"colorMaps": []}))],
        ));
        let client = TilerClient::new("http://tiler", mock.clone());
        assert!(client.get_cached("http://tiler/colorMaps").await.is_err());
        assert!(client.get_cached("http://tiler/colorMaps").await.is_ok());
        assert_eq!(mock.calls(), 2);
    }
}
