//! Authentication module for the ERNIE client.
//!
//! Implements the Qianfan OAuth2 client-credentials flow: access tokens are
//! fetched from the token endpoint, cached, and refreshed when they approach
//! expiration.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::ErnieConfig;
use crate::errors::{ErnieError, ErnieResult};
use crate::transport::HttpTransport;

/// Token endpoint path on the Qianfan host.
const TOKEN_PATH: &str = "/oauth/2.0/token";

/// Refresh tokens this many seconds before they expire.
const REFRESH_BUFFER_SECONDS: i64 = 300;

/// Trait for access-token providers.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a valid access token, refreshing it first if the cached one
    /// is missing or close to expiring.
    async fn access_token(&self) -> ErnieResult<String>;

    /// Forces a refresh and returns the fresh token.
    async fn refresh(&self) -> ErnieResult<String>;
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// OAuth2 client-credentials token provider.
pub struct OAuthTokenProvider {
    transport: Arc<dyn HttpTransport>,
    client_id: String,
    client_secret: SecretString,
    cached: RwLock<Option<CachedToken>>,
    refresh_buffer: ChronoDuration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl OAuthTokenProvider {
    /// Creates a provider from client configuration.
    pub fn new(config: &ErnieConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            client_id: config.client_id.clone(),
            client_secret: SecretString::new(config.client_secret().to_string()),
            cached: RwLock::new(None),
            refresh_buffer: ChronoDuration::seconds(REFRESH_BUFFER_SECONDS),
        }
    }

    fn token_path(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", self.client_secret.expose_secret())
            .finish();
        format!("{}?{}", TOKEN_PATH, query)
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.cached.read();
        guard.as_ref().and_then(|cached| {
            if Utc::now() + self.refresh_buffer < cached.expires_at {
                Some(cached.token.clone())
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn access_token(&self) -> ErnieResult<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        self.refresh().await
    }

    async fn refresh(&self) -> ErnieResult<String> {
        let body = self.transport.get(&self.token_path()).await?;

        let response: TokenResponse =
            serde_json::from_slice(&body).map_err(|e| ErnieError::Deserialization {
                message: e.to_string(),
                body: String::from_utf8_lossy(&body).to_string(),
            })?;

        if let Some(error) = response.error {
            return Err(ErnieError::Authentication {
                message: format!(
                    "{}: {}",
                    error,
                    response.error_description.unwrap_or_default()
                ),
            });
        }

        let token = response
            .access_token
            .ok_or_else(|| ErnieError::Authentication {
                message: "token endpoint returned no access_token".to_string(),
            })?;

        let expires_in = response.expires_in.unwrap_or(0);
        debug!(expires_in, "access token refreshed");

        *self.cached.write() = Some(CachedToken {
            token: token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
        });

        Ok(token)
    }
}

impl std::fmt::Debug for OAuthTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenProvider")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Fixed-token provider for callers that manage tokens themselves.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Creates a provider that always returns the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> ErnieResult<String> {
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> ErnieResult<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockResponse, MockTransport};

    fn test_config() -> ErnieConfig {
        ErnieConfig::builder()
            .client_id("test-id")
            .client_secret("test-secret")
            .build()
            .unwrap()
    }

    fn token_body(token: &str, expires_in: i64) -> serde_json::Value {
        serde_json::json!({"access_token": token, "expires_in": expires_in})
    }

    #[tokio::test]
    async fn test_refresh_fetches_token() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue_response(MockResponse::json(token_body("tok-1", 2592000)));

        let provider = OAuthTokenProvider::new(&test_config(), transport.clone());
        let token = provider.access_token().await.unwrap();

        assert_eq!(token, "tok-1");
        let request = transport.last_request().unwrap();
        assert!(request.url.starts_with("/oauth/2.0/token?"));
        assert!(request.url.contains("grant_type=client_credentials"));
        assert!(request.url.contains("client_id=test-id"));
    }

    #[tokio::test]
    async fn test_token_is_cached_until_expiry_buffer() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue_response(MockResponse::json(token_body("tok-1", 2592000)));

        let provider = OAuthTokenProvider::new(&test_config(), transport.clone());
        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
        assert_eq!(provider.access_token().await.unwrap(), "tok-1");

        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed() {
        let transport = Arc::new(MockTransport::new());
        // Lifetime shorter than the refresh buffer, so it is already stale.
        transport.enqueue_response(MockResponse::json(token_body("tok-1", 10)));
        transport.enqueue_response(MockResponse::json(token_body("tok-2", 2592000)));

        let provider = OAuthTokenProvider::new(&test_config(), transport.clone());
        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
        assert_eq!(provider.access_token().await.unwrap(), "tok-2");

        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_oauth_error_surfaces_as_authentication() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue_response(MockResponse::json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "unknown client id"
        })));

        let provider = OAuthTokenProvider::new(&test_config(), transport);
        let error = provider.access_token().await.unwrap_err();

        match error {
            ErnieError::Authentication { message } => {
                assert!(message.contains("invalid_client"));
                assert!(message.contains("unknown client id"));
            }
            other => panic!("expected Authentication, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_static_provider_returns_fixed_token() {
        let provider = StaticTokenProvider::new("fixed");
        assert_eq!(provider.access_token().await.unwrap(), "fixed");
        assert_eq!(provider.refresh().await.unwrap(), "fixed");
    }
}
