//! ERNIE API client.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{OAuthTokenProvider, TokenProvider};
use crate::config::ErnieConfig;
use crate::errors::{ErnieError, ErnieResult};
use crate::observability::metrics::{DefaultMetricsCollector, MetricsCollector};
use crate::services::{
    ChatService, DefaultChatService, DefaultEmbeddingsService, EmbeddingsService,
};
use crate::transport::{HttpTransport, ReqwestTransport, TransportConfig};

/// The main ERNIE client.
pub struct ErnieClient {
    config: ErnieConfig,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    metrics: Arc<dyn MetricsCollector>,
}

impl ErnieClient {
    /// Creates a new ERNIE client with the given configuration.
    pub fn new(config: ErnieConfig) -> ErnieResult<Self> {
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::with_config(TransportConfig {
                base_url: config.base_url.clone(),
                timeout: config.timeout,
                custom_headers: config.custom_headers.clone(),
            })?);

        let tokens: Arc<dyn TokenProvider> =
            Arc::new(OAuthTokenProvider::new(&config, transport.clone()));

        Ok(Self {
            config,
            transport,
            tokens,
            metrics: Arc::new(DefaultMetricsCollector::new()),
        })
    }

    /// Creates a new client builder.
    pub fn builder() -> ErnieClientBuilder {
        ErnieClientBuilder::new()
    }

    /// Creates a client from application credentials.
    pub fn from_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> ErnieResult<Self> {
        let config = ErnieConfig::builder()
            .client_id(client_id)
            .client_secret(client_secret)
            .build()?;
        Self::new(config)
    }

    /// Creates a client from the environment.
    pub fn from_env() -> ErnieResult<Self> {
        let config = ErnieConfig::from_env()?;
        Self::new(config)
    }

    /// Returns the chat service.
    pub fn chat(&self) -> impl ChatService {
        DefaultChatService::new(
            self.transport.clone(),
            self.tokens.clone(),
            self.metrics.clone(),
            self.config.max_function_rounds,
        )
    }

    /// Returns the embeddings service.
    pub fn embeddings(&self) -> impl EmbeddingsService {
        DefaultEmbeddingsService::new(
            self.transport.clone(),
            self.tokens.clone(),
            self.metrics.clone(),
        )
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &dyn MetricsCollector {
        self.metrics.as_ref()
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ErnieConfig {
        &self.config
    }
}

/// Builder for the ERNIE client.
#[derive(Default)]
pub struct ErnieClientBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_function_rounds: Option<u32>,
    tokens: Option<Arc<dyn TokenProvider>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
}

impl ErnieClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application API key.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the application secret key.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the bound on chained function-call rounds.
    pub fn max_function_rounds(mut self, rounds: u32) -> Self {
        self.max_function_rounds = Some(rounds);
        self
    }

    /// Replaces the token provider (e.g. a pre-fetched token).
    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Sets the metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the client.
    pub fn build(self) -> ErnieResult<ErnieClient> {
        let client_id = self
            .client_id
            .or_else(|| std::env::var("ERNIE_CLIENT_ID").ok())
            .ok_or_else(|| ErnieError::Configuration {
                message: "Client id not provided and ERNIE_CLIENT_ID not set".to_string(),
            })?;
        let client_secret = self
            .client_secret
            .or_else(|| std::env::var("ERNIE_CLIENT_SECRET").ok())
            .ok_or_else(|| ErnieError::Configuration {
                message: "Client secret not provided and ERNIE_CLIENT_SECRET not set".to_string(),
            })?;

        let mut config_builder = ErnieConfig::builder()
            .client_id(client_id)
            .client_secret(client_secret);

        if let Some(base_url) = self.base_url {
            config_builder = config_builder.base_url(base_url);
        }
        if let Some(timeout) = self.timeout {
            config_builder = config_builder.timeout(timeout);
        }
        if let Some(rounds) = self.max_function_rounds {
            config_builder = config_builder.max_function_rounds(rounds);
        }

        let config = config_builder.build()?;

        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::with_config(TransportConfig {
                base_url: config.base_url.clone(),
                timeout: config.timeout,
                custom_headers: config.custom_headers.clone(),
            })?);

        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(OAuthTokenProvider::new(&config, transport.clone())));

        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultMetricsCollector::new()));

        Ok(ErnieClient {
            config,
            transport,
            tokens,
            metrics,
        })
    }
}
