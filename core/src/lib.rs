// Core RAG functionality shared by the index clients and the query daemon:
// - Conversation and retrieval data model
// - Capability traits for the embedding, search and generation services
// - Gemini API client (embedding + streaming generation)
// - Configuration loading
// - Shared error types

// Export types module - Conversation and retrieval data model
pub mod types;
pub use types::*;

// Export traits module - Embed / Search / Generate capabilities
pub mod traits;
pub use traits::*;

// Export client module - API client for Gemini
pub mod client;
pub use client::GeminiClient;

// Export api_types module - Gemini request/response data structures
pub mod api_types;

// Export config module - Configuration loading
pub mod config;
pub use self::config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

pub mod http;
pub mod retry;
pub mod sse;

pub use retry::Retry;
