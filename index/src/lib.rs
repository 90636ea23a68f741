// The rag-index crate provides the vector search backends for the RAG suite.
// - Pinecone REST client for a hosted index
// - Local cosine index over a JSON snapshot
// - Shared ranking helpers

pub mod local;
pub mod pinecone;
pub mod ranking;

pub use local::{LocalIndex, SnapshotRecord};
pub use pinecone::PineconeIndex;

use rag_core::{IndexConfig, IndexProvider, RagResult, Search};
use std::sync::Arc;

/// Build the search backend selected by `config.provider`
pub fn build_index(config: &IndexConfig) -> RagResult<Arc<dyn Search>> {
    Ok(match config.provider {
        IndexProvider::Pinecone => Arc::new(PineconeIndex::new(config)?),
        IndexProvider::Local => Arc::new(LocalIndex::from_config(config)?),
    })
}
