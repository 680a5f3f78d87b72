//! Knowledge retrieval: embed the question, search, keep passages above the threshold

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::document::{Chunk, CATEGORY_KEY};

/// Text embedded once at startup to check the model's output size
const DIMENSION_SAMPLE: &str = "维度测试";

/// A passage retrieved for a question
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity to the question
    pub similarity: f32,
}

impl RetrievedPassage {
    /// File name of the passage's source, without directories
    pub fn source_name(&self) -> Option<String> {
        self.chunk
            .source_path()
            .and_then(|p| Path::new(p).file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    /// Category the passage was ingested under
    pub fn category(&self) -> Option<&str> {
        self.chunk.metadata.get(CATEGORY_KEY).and_then(|v| v.as_str())
    }
}

/// Deduplicated, sorted source file names
pub fn source_names(passages: &[RetrievedPassage]) -> Vec<String> {
    passages
        .iter()
        .filter_map(RetrievedPassage::source_name)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Similarity-threshold retriever over a vector store
pub struct KnowledgeRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    top_k: usize,
    threshold: f32,
}

impl KnowledgeRetriever {
    /// Create a retriever
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k: config.top_k,
            threshold: config.similarity_threshold,
        }
    }

    /// Up to `top_k` passages whose similarity is at least the threshold, best first
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedPassage>> {
        let query_embedding = self.embedder.embed(question).await?;
        let results = self.store.search(&query_embedding, self.top_k).await?;
        let total = results.len();

        let passages: Vec<RetrievedPassage> = results
            .into_iter()
            .filter(|r| r.similarity >= self.threshold)
            .map(|r| RetrievedPassage {
                chunk: r.chunk,
                similarity: r.similarity,
            })
            .collect();

        tracing::debug!(
            "Retrieved {}/{} passages at or above similarity {}",
            passages.len(),
            total,
            self.threshold
        );
        Ok(passages)
    }

    /// Fail when the embedding model and the knowledge base disagree on dimensions
    pub async fn verify_dimensions(&self) -> Result<()> {
        let sample = self.embedder.embed(DIMENSION_SAMPLE).await?;
        let expected = self.store.dimensions();

        if sample.len() != expected || self.embedder.dimensions() != expected {
            return Err(Error::Config(format!(
                "embedding dimension mismatch: model {} produces {}, configured {}, knowledge base has {}; rebuild the knowledge base",
                self.embedder.name(),
                sample.len(),
                self.embedder.dimensions(),
                expected
            )));
        }
        Ok(())
    }
}
