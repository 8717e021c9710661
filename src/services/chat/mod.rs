//! Chat completion service and its streaming reconciliation internals.

pub mod merge;
mod service;

pub use service::{ChatService, ChunkHandler, DefaultChatService};
