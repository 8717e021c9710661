//! Service implementations for the ERNIE API.

pub mod chat;
pub mod embeddings;

pub use chat::{ChatService, ChunkHandler, DefaultChatService};
pub use embeddings::{DefaultEmbeddingsService, EmbeddingsService};
