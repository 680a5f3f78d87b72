//! Local vector store: in-memory cosine search persisted as one JSON index file

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

use super::vector_store::{StoredChunk, VectorSearchResult, VectorStoreProvider};

/// File name of the persisted index inside the knowledge-base directory
pub const INDEX_FILE: &str = "index.json";

const INDEX_VERSION: u32 = 1;

/// Persisted knowledge index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeIndex {
    /// Format version
    pub version: u32,
    /// Model that produced the embeddings
    pub embedding_model: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Build time
    pub created_at: DateTime<Utc>,
    /// Free-form collection metadata
    #[serde(default)]
    pub collection: BTreeMap<String, String>,
    /// Embedded chunks
    pub chunks: Vec<StoredChunk>,
}

/// Local vector store with brute-force cosine search
pub struct LocalVectorStore {
    dir: PathBuf,
    dimensions: usize,
    index: Arc<RwLock<KnowledgeIndex>>,
}

impl LocalVectorStore {
    /// Start an empty store that will persist into `dir`
    pub fn create(dir: impl Into<PathBuf>, embedding_model: impl Into<String>, dimensions: usize) -> Self {
        let mut collection = BTreeMap::new();
        collection.insert("space".to_string(), "cosine".to_string());
        collection.insert("institution".to_string(), "西北大学".to_string());

        Self {
            dir: dir.into(),
            dimensions,
            index: Arc::new(RwLock::new(KnowledgeIndex {
                version: INDEX_VERSION,
                embedding_model: embedding_model.into(),
                dimensions,
                created_at: Utc::now(),
                collection,
                chunks: Vec::new(),
            })),
        }
    }

    /// Whether `dir` holds a persisted index
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE).is_file()
    }

    /// Load a persisted index from `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(INDEX_FILE);
        let file = std::fs::File::open(&path)
            .map_err(|e| Error::vector_db(format!("cannot open {}: {}", path.display(), e)))?;
        let index: KnowledgeIndex = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::vector_db(format!("corrupt index {}: {}", path.display(), e)))?;

        if index.version != INDEX_VERSION {
            return Err(Error::vector_db(format!(
                "unsupported index version {} in {}",
                index.version,
                path.display()
            )));
        }

        tracing::info!(
            "Loaded knowledge index from {} ({} chunks, {} dims, model {})",
            dir.display(),
            index.chunks.len(),
            index.dimensions,
            index.embedding_model
        );

        Ok(Self {
            dimensions: index.dimensions,
            dir,
            index: Arc::new(RwLock::new(index)),
        })
    }

    /// Embedding model recorded in the index
    pub fn embedding_model(&self) -> String {
        self.index.read().embedding_model.clone()
    }
}

/// Cosine similarity; zero for zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn write_index(dir: &Path, index: &KnowledgeIndex) -> Result<()> {
    let final_path = dir.join(INDEX_FILE);
    let tmp_path = dir.join(format!("{}.tmp", INDEX_FILE));

    let result = (|| -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let mut writer = BufWriter::new(std::fs::File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, index)?;
        writer.flush()?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result.map_err(|e| Error::vector_db(format!("failed to persist {}: {}", final_path.display(), e)))
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn insert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<()> {
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != self.dimensions) {
            return Err(Error::vector_db(format!(
                "chunk {} has {} dimensions, index expects {}",
                bad.chunk.id,
                bad.embedding.len(),
                self.dimensions
            )));
        }
        self.index.write().chunks.extend(chunks);
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        if query_embedding.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "query has {} dimensions, index expects {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        let index = self.index.read();
        let mut scored: Vec<(f32, &StoredChunk)> = index
            .chunks
            .iter()
            .map(|stored| (cosine_similarity(query_embedding, &stored.embedding), stored))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, stored)| VectorSearchResult {
                chunk: stored.chunk.clone(),
                similarity,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.read().chunks.len())
    }

    async fn persist(&self) -> Result<()> {
        let index = Arc::clone(&self.index);
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || write_index(&dir, &index.read()))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "local-cosine"
    }
}
