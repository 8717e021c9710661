//! Configuration module for the ERNIE client.
//!
//! Provides configuration management including API credentials, base URLs,
//! timeouts, and function-calling limits.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::errors::{ErnieError, ErnieResult};

/// Default base URL for the Qianfan API.
pub const DEFAULT_BASE_URL: &str = "https://aip.baidubce.com";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default bound on chained function-call rounds per exchange.
pub const DEFAULT_MAX_FUNCTION_ROUNDS: u32 = 4;

/// Configuration for the ERNIE client.
#[derive(Clone)]
pub struct ErnieConfig {
    /// API key / client id of the Qianfan application.
    pub client_id: String,
    /// Secret key of the Qianfan application (stored securely).
    pub(crate) client_secret: SecretString,
    /// Base URL for API requests.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Bound on chained function-call rounds per exchange.
    pub max_function_rounds: u32,
    /// Custom headers to include in requests.
    pub custom_headers: Vec<(String, String)>,
}

impl ErnieConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ErnieConfigBuilder {
        ErnieConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ERNIE_CLIENT_ID` (required): Qianfan application API key
    /// - `ERNIE_CLIENT_SECRET` (required): Qianfan application secret key
    /// - `ERNIE_BASE_URL` (optional): Custom base URL
    /// - `ERNIE_TIMEOUT` (optional): Request timeout in seconds
    pub fn from_env() -> ErnieResult<Self> {
        let client_id =
            std::env::var("ERNIE_CLIENT_ID").map_err(|_| ErnieError::Configuration {
                message: "ERNIE_CLIENT_ID environment variable not set".to_string(),
            })?;
        let client_secret =
            std::env::var("ERNIE_CLIENT_SECRET").map_err(|_| ErnieError::Configuration {
                message: "ERNIE_CLIENT_SECRET environment variable not set".to_string(),
            })?;

        let mut builder = ErnieConfigBuilder::new()
            .client_id(client_id)
            .client_secret(client_secret);

        if let Ok(base_url) = std::env::var("ERNIE_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(timeout_str) = std::env::var("ERNIE_TIMEOUT") {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(timeout_secs));
            }
        }

        builder.build()
    }

    /// Returns the secret key (exposing the secret).
    pub(crate) fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}

impl std::fmt::Debug for ErnieConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErnieConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_function_rounds", &self.max_function_rounds)
            .finish()
    }
}

/// Builder for `ErnieConfig`.
#[derive(Default)]
pub struct ErnieConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_function_rounds: Option<u32>,
    custom_headers: Vec<(String, String)>,
}

impl ErnieConfigBuilder {
    /// Creates a new configuration builder.
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
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
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

    /// Adds a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ErnieResult<ErnieConfig> {
        let client_id = self.client_id.ok_or_else(|| ErnieError::Configuration {
            message: "Client id is required".to_string(),
        })?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| ErnieError::Configuration {
                message: "Client secret is required".to_string(),
            })?;

        if client_id.is_empty() {
            return Err(ErnieError::Configuration {
                message: "Client id cannot be empty".to_string(),
            });
        }
        if client_secret.is_empty() {
            return Err(ErnieError::Configuration {
                message: "Client secret cannot be empty".to_string(),
            });
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ErnieError::Configuration {
                message: "Base URL must start with http:// or https://".to_string(),
            });
        }

        Ok(ErnieConfig {
            client_id,
            client_secret: SecretString::new(client_secret),
            base_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_function_rounds: self
                .max_function_rounds
                .unwrap_or(DEFAULT_MAX_FUNCTION_ROUNDS),
            custom_headers: self.custom_headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_success() {
        let config = ErnieConfig::builder()
            .client_id("test-client-id")
            .client_secret("test-secret")
            .base_url("https://custom.baidubce.com")
            .timeout(Duration::from_secs(30))
            .max_function_rounds(2)
            .build()
            .unwrap();

        assert_eq!(config.client_id, "test-client-id");
        assert_eq!(config.client_secret(), "test-secret");
        assert_eq!(config.base_url, "https://custom.baidubce.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_function_rounds, 2);
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ErnieConfig::builder()
            .client_id("id")
            .client_secret("secret")
            .build()
            .unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_function_rounds, DEFAULT_MAX_FUNCTION_ROUNDS);
    }

    #[test]
    fn test_config_builder_missing_credentials() {
        assert!(ErnieConfig::builder().build().is_err());
        assert!(ErnieConfig::builder().client_id("id").build().is_err());
        assert!(ErnieConfig::builder()
            .client_id("")
            .client_secret("secret")
            .build()
            .is_err());
    }

    #[test]
    fn test_config_builder_invalid_base_url() {
        let result = ErnieConfig::builder()
            .client_id("id")
            .client_secret("secret")
            .base_url("invalid-url")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builder_trims_trailing_slash() {
        let config = ErnieConfig::builder()
            .client_id("id")
            .client_secret("secret")
            .base_url("https://aip.baidubce.com/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "https://aip.baidubce.com");
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = ErnieConfig::builder()
            .client_id("id")
            .client_secret("very-secret")
            .build()
            .unwrap();

        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("very-secret"));
    }
}
