//! ERNIE Bot Client Library
//!
//! A production-ready Rust client for the Baidu ERNIE Bot (Qianfan) API
//! with streaming chat completions, function calling, web-search
//! citations, and text embeddings.
//!
//! # Features
//!
//! - **Streaming Chat**: Server-sent-event streaming with incremental
//!   delivery and a consistent final merged response
//! - **Function Calling**: Register invocable functions; multi-round
//!   call continuations are driven automatically
//! - **Content Safety**: Service-side safety rejections surface as typed
//!   errors carrying the flagged text and ban round
//! - **OAuth2 Credentials**: Access tokens are refreshed and cached
//!   transparently
//! - **Observability**: `tracing` instrumentation and request metrics
//! - **Async/Await**: Built on Tokio for high-performance async I/O
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ernie_client::{ChatRequest, ChatModel, ErnieClient, Message};
//! use ernie_client::services::ChatService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ErnieClient::builder()
//!         .client_id("your-api-key")
//!         .client_secret("your-secret-key")
//!         .build()?;
//!
//!     let request = ChatRequest::builder()
//!         .model(ChatModel::ErnieBot)
//!         .message(Message::user("你好, ERNIE!"))
//!         .build();
//!
//!     let response = client.chat().create(request).await?;
//!     println!("{}", response.content());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{ErnieClient, ErnieClientBuilder};
pub use config::ErnieConfig;
pub use errors::{ErnieError, ErnieResult};

// Type re-exports
pub use services::{ChatService, ChunkHandler, EmbeddingsService};
pub use types::chat::{
    ChatModel, ChatRequest, ChatResponse, Message, SearchInfo, SearchItem, Sentence,
};
pub use types::common::{Role, Usage};
pub use types::embeddings::{EmbeddingModel, EmbeddingRequest, EmbeddingResponse};
pub use types::functions::{ChatFunction, FunctionCall, FunctionDefinition, FunctionRegistry};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
