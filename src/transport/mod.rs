//! HTTP transport module for the ERNIE client.
//!
//! Provides the HTTP transport layer for making API requests,
//! including support for regular requests and streaming.

mod http_transport;

pub use http_transport::{decode_event_stream, HttpTransport, ReqwestTransport, TransportConfig};

use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

use crate::errors::ErnieResult;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request.
    Post,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// HTTP response.
#[derive(Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

/// Byte stream type for streaming responses.
pub type ByteStream = Pin<Box<dyn Stream<Item = ErnieResult<Bytes>> + Send>>;

/// Decoded event stream type for streaming responses.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = ErnieResult<T>> + Send>>;
