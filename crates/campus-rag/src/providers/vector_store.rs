//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Chunk;

/// A chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// The chunk
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Its embedding
    pub embedding: Vec<f32>,
}

/// Search result from vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (higher is more similar)
    pub similarity: f32,
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `LocalVectorStore`: in-memory cosine search persisted as JSON
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert embedded chunks
    async fn insert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<()>;

    /// Most similar chunks, best first
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>>;

    /// Total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Flush to durable storage
    async fn persist(&self) -> Result<()>;

    /// Dimension every stored embedding has
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;
}
