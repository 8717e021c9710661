//! HTTP transport implementation using reqwest.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

use super::{ByteStream, EventStream, HttpResponse, Method};
use crate::errors::{ApiErrorBody, ErnieError, ErnieResult};

/// HTTP transport trait for the ERNIE client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes an HTTP request.
    async fn execute(
        &self,
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ErnieResult<HttpResponse>;

    /// Executes a streaming HTTP request.
    async fn execute_stream(
        &self,
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ErnieResult<ByteStream>;

    /// Convenience method for GET requests.
    async fn get(&self, path: &str) -> ErnieResult<Vec<u8>>;

    /// Convenience method for POST requests.
    async fn post(&self, path: &str, body: Vec<u8>) -> ErnieResult<Vec<u8>>;

    /// Convenience method for streaming POST requests. Callers reframe the
    /// raw bytes with [`decode_event_stream`].
    async fn post_stream(&self, path: &str, body: Vec<u8>) -> ErnieResult<ByteStream>;
}

/// Reqwest-based HTTP transport implementation.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    custom_headers: Vec<(String, String)>,
}

/// Configuration for [`ReqwestTransport`].
pub struct TransportConfig {
    /// Base URL for the API.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Extra headers to send with every request.
    pub custom_headers: Vec<(String, String)>,
}

impl ReqwestTransport {
    /// Creates a new transport with configuration.
    pub fn with_config(config: TransportConfig) -> ErnieResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ErnieError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url,
            custom_headers: config.custom_headers,
        })
    }

    /// Gets the default headers for requests.
    fn default_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        for (key, value) in &self.custom_headers {
            headers.insert(key.clone(), value.clone());
        }
        headers
    }

    /// Builds a full URL from a path (the path may carry a query string).
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps HTTP status codes to ERNIE errors.
    fn map_http_error(status: u16, body: &Bytes, headers: &HashMap<String, String>) -> ErnieError {
        // A structured Qianfan error body wins over the bare status.
        if let Ok(api_error) = serde_json::from_slice::<ApiErrorBody>(body) {
            return api_error.into();
        }

        let message = String::from_utf8_lossy(body).to_string();
        let retry_after = headers
            .get("retry-after")
            .or_else(|| headers.get("Retry-After"))
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        match status {
            400 => ErnieError::BadRequest { message },
            401 | 403 => ErnieError::Authentication { message },
            404 => ErnieError::NotFound { message },
            429 => ErnieError::RateLimit {
                message,
                retry_after,
            },
            500 => ErnieError::Internal {
                message,
                request_id: headers.get("x-request-id").cloned(),
            },
            503 => ErnieError::ServiceUnavailable {
                message,
                retry_after,
            },
            _ => ErnieError::Unknown { status, message },
        }
    }

    /// Converts response headers to a HashMap.
    fn extract_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_string(), val.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ErnieResult<HttpResponse> {
        let mut request = self.client.request(method.into(), &url);

        for (key, value) in &headers {
            request = request.header(key, value);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let response_headers = Self::extract_headers(response.headers());
        let body = response.bytes().await?;

        if status >= 400 {
            return Err(Self::map_http_error(status, &body, &response_headers));
        }

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body,
        })
    }

    async fn execute_stream(
        &self,
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ErnieResult<ByteStream> {
        let mut request = self.client.request(method.into(), &url);

        for (key, value) in &headers {
            request = request.header(key, value);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        if status >= 400 {
            let response_headers = Self::extract_headers(response.headers());
            let body = response.bytes().await?;
            return Err(Self::map_http_error(status, &body, &response_headers));
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| ErnieError::Stream {
                message: e.to_string(),
            })
        });

        Ok(Box::pin(stream))
    }

    async fn get(&self, path: &str) -> ErnieResult<Vec<u8>> {
        let url = self.build_url(path);
        let response = self
            .execute(Method::Get, url, self.default_headers(), None)
            .await?;
        Ok(response.body.to_vec())
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> ErnieResult<Vec<u8>> {
        let url = self.build_url(path);
        let response = self
            .execute(
                Method::Post,
                url,
                self.default_headers(),
                Some(Bytes::from(body)),
            )
            .await?;
        Ok(response.body.to_vec())
    }

    async fn post_stream(&self, path: &str, body: Vec<u8>) -> ErnieResult<ByteStream> {
        let url = self.build_url(path);
        self.execute_stream(
            Method::Post,
            url,
            self.default_headers(),
            Some(Bytes::from(body)),
        )
        .await
    }
}

/// Reframes a raw byte stream into decoded events.
///
/// Events arrive as server-sent `data: {...}` lines, but network frames do
/// not respect line boundaries, so bytes are buffered until a full line is
/// available. A trailing unterminated line (a plain JSON body, or a final
/// event without a newline) is flushed at end of stream.
pub fn decode_event_stream<T: serde::de::DeserializeOwned + Send + 'static>(
    mut bytes: ByteStream,
) -> EventStream<T> {
    Box::pin(async_stream::try_stream! {
        let mut buffer = BytesMut::new();

        while let Some(frame) = bytes.next().await {
            buffer.extend_from_slice(&frame?);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.split_to(pos + 1);
                if let Some(event) = parse_event_line::<T>(&line)? {
                    yield event;
                }
            }
        }

        if let Some(event) = parse_event_line::<T>(&buffer)? {
            yield event;
        }
    })
}

/// Decodes one framed line: strips the SSE `data:` prefix, skips
/// keep-alive blanks, and parses the JSON payload.
fn parse_event_line<T: serde::de::DeserializeOwned>(line: &[u8]) -> ErnieResult<Option<T>> {
    let text = std::str::from_utf8(line).map_err(|e| ErnieError::Deserialization {
        message: format!("stream event is not valid UTF-8: {}", e),
        body: String::from_utf8_lossy(line).to_string(),
    })?;

    let payload = text.trim();
    let payload = payload
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(payload);

    if payload.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| ErnieError::Deserialization {
            message: e.to_string(),
            body: payload.to_string(),
        })
}
