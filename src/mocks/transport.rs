//! Mock transport for testing.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::errors::{ErnieError, ErnieResult};
use crate::transport::{ByteStream, HttpResponse, HttpTransport, Method};

/// A recorded request for verification.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Bytes>,
}

/// A mock response to return.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl MockResponse {
    /// Creates a successful JSON response.
    pub fn json(body: impl serde::Serialize) -> Self {
        Self {
            status: 200,
            headers: {
                let mut h = HashMap::new();
                h.insert("content-type".to_string(), "application/json".to_string());
                h
            },
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }

    /// Creates a successful server-sent-events response, one `data:` event
    /// per entry.
    pub fn sse(events: &[serde_json::Value]) -> Self {
        let body: String = events
            .iter()
            .map(|event| format!("data: {}\n\n", event))
            .collect();
        Self {
            status: 200,
            headers: {
                let mut h = HashMap::new();
                h.insert("content-type".to_string(), "text/event-stream".to_string());
                h
            },
            body: Bytes::from(body),
        }
    }

    /// Creates an error response with a Qianfan error body.
    pub fn error(status: u16, code: i64, message: &str) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::from(format!(
                r#"{{"error_code":{},"error_msg":"{}"}}"#,
                code, message
            )),
        }
    }
}

/// Mock transport for testing.
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a response to the queue.
    pub fn enqueue_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Gets all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn record_request(
        &self,
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url,
            headers,
            body,
        });
    }

    fn next_response(&self) -> ErnieResult<MockResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ErnieError::Stream {
                message: "no mock response configured".to_string(),
            })
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(
        &self,
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ErnieResult<HttpResponse> {
        self.record_request(method, url, headers, body);

        let response = self.next_response()?;

        if response.status >= 400 {
            return Err(ErnieError::Unknown {
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }

    async fn execute_stream(
        &self,
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ErnieResult<ByteStream> {
        self.record_request(method, url, headers, body);

        let response = self.next_response()?;

        if response.status >= 400 {
            return Err(ErnieError::Unknown {
                status: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let stream = futures::stream::once(async move { Ok(response.body) });
        Ok(Box::pin(stream))
    }

    async fn get(&self, path: &str) -> ErnieResult<Vec<u8>> {
        let response = self
            .execute(Method::Get, path.to_string(), HashMap::new(), None)
            .await?;
        Ok(response.body.to_vec())
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> ErnieResult<Vec<u8>> {
        let response = self
            .execute(
                Method::Post,
                path.to_string(),
                HashMap::new(),
                Some(Bytes::from(body)),
            )
            .await?;
        Ok(response.body.to_vec())
    }

    async fn post_stream(&self, path: &str, body: Vec<u8>) -> ErnieResult<ByteStream> {
        self.execute_stream(
            Method::Post,
            path.to_string(),
            HashMap::new(),
            Some(Bytes::from(body)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_transport_basic() {
        let transport = MockTransport::new();
        transport.enqueue_response(MockResponse::json(serde_json::json!({"status": "ok"})));

        let response = transport.get("/test").await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&response).unwrap();

        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_mock_transport_records_requests() {
        let transport = MockTransport::new();
        transport.enqueue_response(MockResponse::json(serde_json::json!({})));

        let _ = transport.post("/test", b"body".to_vec()).await;

        assert_eq!(transport.request_count(), 1);

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "/test");
        assert!(matches!(request.method, Method::Post));
    }

    #[tokio::test]
    async fn test_mock_transport_error_response() {
        let transport = MockTransport::new();
        transport.enqueue_response(MockResponse::error(500, 9999, "Server error"));

        let result = transport.get("/test").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_sse_body_frames() {
        let transport = MockTransport::new();
        transport.enqueue_response(MockResponse::sse(&[
            serde_json::json!({"result":"a"}),
            serde_json::json!({"result":"b"}),
        ]));

        let stream = transport.post_stream("/chat", Vec::new()).await.unwrap();
        let frames: Vec<_> = stream.collect().await;
        assert_eq!(frames.len(), 1);
        let body = frames[0].as_ref().unwrap();
        assert_eq!(
            std::str::from_utf8(body).unwrap(),
            "data: {\"result\":\"a\"}\n\ndata: {\"result\":\"b\"}\n\n"
        );
    }
}
