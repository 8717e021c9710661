//! Type definitions for the ERNIE API.

pub mod chat;
pub mod common;
pub mod embeddings;
pub mod functions;
