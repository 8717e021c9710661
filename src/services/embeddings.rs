//! Embeddings service.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::auth::TokenProvider;
use crate::errors::{ApiErrorBody, ErnieError, ErnieResult};
use crate::observability::metrics::MetricsCollector;
use crate::transport::HttpTransport;
use crate::types::embeddings::{EmbeddingModel, EmbeddingRequest, EmbeddingResponse};

/// Embeddings service trait.
#[async_trait]
pub trait EmbeddingsService: Send + Sync {
    /// Creates embeddings for the request's input texts.
    async fn create(&self, request: EmbeddingRequest) -> ErnieResult<EmbeddingResponse>;
}

/// Default implementation of the embeddings service.
pub struct DefaultEmbeddingsService {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    metrics: Arc<dyn MetricsCollector>,
}

impl DefaultEmbeddingsService {
    /// Creates a new embeddings service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenProvider>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            transport,
            tokens,
            metrics,
        }
    }

    fn embeddings_path(model: &EmbeddingModel, token: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("access_token", token)
            .finish();
        format!(
            "/rpc/2.0/ai_custom/v1/wenxinworkshop/embeddings/{}?{}",
            model.endpoint(),
            query
        )
    }
}

#[async_trait]
impl EmbeddingsService for DefaultEmbeddingsService {
    async fn create(&self, request: EmbeddingRequest) -> ErnieResult<EmbeddingResponse> {
        let token = self.tokens.access_token().await?;
        let body = serde_json::to_vec(&request)?;
        debug!(
            model = request.model.endpoint(),
            inputs = request.input.len(),
            "embedding request issued"
        );

        let started = Instant::now();
        let path = Self::embeddings_path(&request.model, &token);
        let result = self.transport.post(&path, body).await;

        let endpoint = "embeddings";
        let raw = match result {
            Ok(raw) => raw,
            Err(error) => {
                self.metrics
                    .record_request(endpoint, started.elapsed(), false);
                self.metrics.record_error(endpoint, error.kind());
                return Err(error);
            }
        };

        // The API reports failures as a 200 with an error body.
        if let Ok(api_error) = serde_json::from_slice::<ApiErrorBody>(&raw) {
            let error = ErnieError::from(api_error);
            self.metrics
                .record_request(endpoint, started.elapsed(), false);
            self.metrics.record_error(endpoint, error.kind());
            return Err(error);
        }

        let response: EmbeddingResponse =
            serde_json::from_slice(&raw).map_err(|e| ErnieError::Deserialization {
                message: e.to_string(),
                body: String::from_utf8_lossy(&raw).to_string(),
            })?;

        self.metrics
            .record_request(endpoint, started.elapsed(), true);
        self.metrics.record_tokens(&response.usage);

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;
    use crate::mocks::{MockResponse, MockTransport};
    use crate::observability::metrics::DefaultMetricsCollector;
    use serde_json::json;

    fn service(transport: Arc<MockTransport>) -> DefaultEmbeddingsService {
        DefaultEmbeddingsService::new(
            transport,
            Arc::new(StaticTokenProvider::new("test-token")),
            Arc::new(DefaultMetricsCollector::new()),
        )
    }

    #[tokio::test]
    async fn test_create_embeddings() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue_response(MockResponse::json(json!({
            "id":"as-emb","object":"embedding_list","created":1700000000,
            "data":[{"object":"embedding","index":0,"embedding":[0.1,0.2,0.3]}],
            "usage":{"prompt_tokens":4,"completion_tokens":0,"total_tokens":4}
        })));

        let response = service(transport.clone())
            .create(EmbeddingRequest::new(
                EmbeddingModel::EmbeddingV1,
                vec!["你好".to_string()],
            ))
            .await
            .unwrap();

        assert_eq!(response.data[0].embedding.len(), 3);
        assert_eq!(response.usage.total_tokens, 4);

        let request = transport.last_request().unwrap();
        assert!(request
            .url
            .starts_with("/rpc/2.0/ai_custom/v1/wenxinworkshop/embeddings/embedding-v1?"));
        assert!(request.url.contains("access_token=test-token"));
    }

    #[tokio::test]
    async fn test_api_error_body_is_classified() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue_response(MockResponse::json(json!({
            "error_code":110,"error_msg":"Access token invalid"
        })));

        let error = service(transport)
            .create(EmbeddingRequest::new(
                EmbeddingModel::EmbeddingV1,
                vec!["你好".to_string()],
            ))
            .await
            .unwrap_err();

        assert!(matches!(error, ErnieError::Authentication { .. }));
    }
}
