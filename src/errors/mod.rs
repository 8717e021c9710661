//! Error types for the ERNIE client.
//!
//! Provides a comprehensive error taxonomy covering all possible failure modes
//! including API errors, network errors, content-safety rejections, and
//! function-calling errors.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for ERNIE operations.
pub type ErnieResult<T> = Result<T, ErnieError>;

/// Comprehensive error type for ERNIE client operations.
#[derive(Debug, Error)]
pub enum ErnieError {
    /// Configuration error (invalid credentials, base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Authentication error (token refresh failed or token rejected).
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message from the OAuth endpoint or the API.
        message: String,
    },

    /// The service refused to continue the exchange on content-safety
    /// grounds. The offending text and the ban round are carried for
    /// callers to inspect; `ban_round` is `-1` when the service supplied
    /// no numeric round.
    #[error("response is not safe! ban={ban_round}")]
    ResponseNotSafe {
        /// The assistant text the service flagged.
        content: String,
        /// Ban round reported by the service, `-1` if absent.
        ban_round: i32,
    },

    /// The model requested a function that is not registered on the request.
    #[error("unknown function: {name}")]
    UnknownFunction {
        /// The requested function name.
        name: String,
    },

    /// The function-call continuation chain exceeded the configured bound.
    #[error("function call rounds exceeded limit of {limit}")]
    FunctionRoundsExceeded {
        /// The configured maximum number of rounds.
        limit: u32,
    },

    /// Structured Qianfan error body (`error_code` / `error_msg`).
    #[error("API error {code}: {message}")]
    Api {
        /// Qianfan error code.
        code: i64,
        /// Error message from the API.
        message: String,
    },

    /// Bad request (invalid request parameters).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message describing the validation issue.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        /// Error message.
        message: String,
        /// Duration to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// Internal server error.
    #[error("Internal server error: {message}")]
    Internal {
        /// Error message.
        message: String,
        /// Request ID for debugging.
        request_id: Option<String>,
    },

    /// Service unavailable.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message.
        message: String,
        /// Duration to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// Request timeout.
    #[error("Request timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// Network/connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Streaming error.
    #[error("Stream error: {message}")]
    Stream {
        /// Error message.
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Deserialization error.
    #[error("Deserialization error: {message}")]
    Deserialization {
        /// Error message.
        message: String,
        /// The body that failed to decode.
        body: String,
    },

    /// Unknown error.
    #[error("Unknown error (HTTP {status}): {message}")]
    Unknown {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },
}

impl ErnieError {
    /// Returns true if this error is retryable.
    ///
    /// Safety rejections, unknown functions and round exhaustion are
    /// terminal and never retryable; retry policy for the rest is the
    /// caller's decision.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErnieError::RateLimit { .. }
                | ErnieError::ServiceUnavailable { .. }
                | ErnieError::Internal { .. }
                | ErnieError::Timeout { .. }
                | ErnieError::Connection { .. }
        )
    }

    /// Returns the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ErnieError::RateLimit { retry_after, .. } => *retry_after,
            ErnieError::ServiceUnavailable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// A short stable label for the error variant, used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ErnieError::Configuration { .. } => "configuration",
            ErnieError::Authentication { .. } => "authentication",
            ErnieError::ResponseNotSafe { .. } => "response_not_safe",
            ErnieError::UnknownFunction { .. } => "unknown_function",
            ErnieError::FunctionRoundsExceeded { .. } => "function_rounds_exceeded",
            ErnieError::Api { .. } => "api",
            ErnieError::BadRequest { .. } => "bad_request",
            ErnieError::NotFound { .. } => "not_found",
            ErnieError::RateLimit { .. } => "rate_limit",
            ErnieError::Internal { .. } => "internal",
            ErnieError::ServiceUnavailable { .. } => "service_unavailable",
            ErnieError::Timeout { .. } => "timeout",
            ErnieError::Connection { .. } => "connection",
            ErnieError::Stream { .. } => "stream",
            ErnieError::Serialization { .. } => "serialization",
            ErnieError::Deserialization { .. } => "deserialization",
            ErnieError::Unknown { .. } => "unknown",
        }
    }

    /// Maps a Qianfan `error_code` body onto the taxonomy.
    ///
    /// Token problems (expired, invalid, disabled) land on
    /// [`ErnieError::Authentication`], throttling codes on
    /// [`ErnieError::RateLimit`], parameter errors on
    /// [`ErnieError::BadRequest`]; everything else stays a raw
    /// [`ErnieError::Api`].
    pub fn from_api_code(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            13 | 14 | 100 | 110 | 111 => ErnieError::Authentication { message },
            4 | 17 | 18 | 19 => ErnieError::RateLimit {
                message,
                retry_after: None,
            },
            336000..=336999 => ErnieError::BadRequest { message },
            _ => ErnieError::Api { code, message },
        }
    }
}

/// Error body returned by the Qianfan API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorBody {
    /// Qianfan error code.
    pub error_code: i64,
    /// Error message.
    pub error_msg: String,
}

impl From<ApiErrorBody> for ErnieError {
    fn from(body: ApiErrorBody) -> Self {
        ErnieError::from_api_code(body.error_code, body.error_msg)
    }
}

impl From<reqwest::Error> for ErnieError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ErnieError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            ErnieError::Connection {
                message: err.to_string(),
            }
        } else {
            ErnieError::Unknown {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ErnieError {
    fn from(err: serde_json::Error) -> Self {
        ErnieError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ErnieError {
    fn from(err: url::ParseError) -> Self {
        ErnieError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
