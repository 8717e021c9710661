//! Embedding types.

use serde::{Deserialize, Serialize};

use super::common::Usage;

/// ERNIE embedding model, identifying the remote endpoint to invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingModel {
    /// Embedding-V1, the default text embedding model.
    EmbeddingV1,
    /// A custom-deployed endpoint path segment.
    Custom(String),
}

impl EmbeddingModel {
    /// Returns the endpoint path segment for this model.
    pub fn endpoint(&self) -> &str {
        match self {
            EmbeddingModel::EmbeddingV1 => "embedding-v1",
            EmbeddingModel::Custom(endpoint) => endpoint,
        }
    }
}

impl Default for EmbeddingModel {
    fn default() -> Self {
        EmbeddingModel::EmbeddingV1
    }
}

/// Embedding request.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    /// Model to invoke. Routed through the URL, not the body.
    #[serde(skip)]
    pub model: EmbeddingModel,
    /// Texts to embed.
    pub input: Vec<String>,
    /// End-user identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl EmbeddingRequest {
    /// Creates a new embedding request.
    pub fn new(model: EmbeddingModel, input: Vec<String>) -> Self {
        Self {
            model,
            input,
            user_id: None,
        }
    }

    /// Sets the end-user identifier.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Embedding response.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    /// Response ID.
    pub id: String,
    /// Object kind (`embedding_list`).
    pub object: String,
    /// Creation timestamp, seconds since the epoch.
    pub created: i64,
    /// One embedding per input text, in input order.
    pub data: Vec<Embedding>,
    /// Token usage.
    pub usage: Usage,
}

/// A single embedding vector.
#[derive(Debug, Clone, Deserialize)]
pub struct Embedding {
    /// Object kind (`embedding`).
    pub object: String,
    /// Index of the input this vector belongs to.
    pub index: usize,
    /// The embedding vector.
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = EmbeddingRequest::new(
            EmbeddingModel::EmbeddingV1,
            vec!["第一段".to_string(), "第二段".to_string()],
        );

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("model").is_none());
        assert_eq!(body["input"][1], "第二段");
        assert!(body.get("user_id").is_none());
    }

    #[test]
    fn test_response_decode() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"id":"as-emb","object":"embedding_list","created":1700000000,
                "data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],
                "usage":{"prompt_tokens":4,"completion_tokens":0,"total_tokens":4}}"#,
        )
        .unwrap();

        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].embedding.len(), 2);
        assert_eq!(response.usage.total_tokens, 4);
    }
}
