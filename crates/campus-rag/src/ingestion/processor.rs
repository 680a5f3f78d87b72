//! Ingestion pipeline orchestration
//!
//! scan → load → clean → split → embed → persist. Per-file problems are
//! logged and recorded in the [`IngestReport`]; only an empty corpus, an
//! embedding failure or a persist failure aborts the run.

use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::cleaner::clean_text;
use super::loader::DocumentLoader;
use super::splitter::TextSplitter;
use crate::config::IngestionConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, LocalVectorStore, StoredChunk, VectorStoreProvider};
use crate::types::document::{Chunk, Document, CATEGORY_KEY};

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Non-empty documents that made it into the index
    pub documents_loaded: usize,
    /// Chunks embedded and persisted
    pub chunks_created: usize,
    /// Files left out, with the reason
    pub skipped: Vec<(PathBuf, String)>,
    /// Configured categories with no directory under the docs root
    pub missing_categories: Vec<String>,
}

/// A file picked up by the scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub category: String,
    pub path: PathBuf,
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    config: IngestionConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    concurrency: usize,
}

impl IngestPipeline {
    /// Create a pipeline; every category's chunking is validated up front
    pub fn new(
        config: IngestionConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        concurrency: usize,
    ) -> Result<Self> {
        for category in &config.categories {
            category.validate()?;
        }
        TextSplitter::new(config.default_chunk_size, config.default_chunk_overlap)?;

        Ok(Self {
            config,
            embedder,
            concurrency,
        })
    }

    /// Splitter for a category, falling back to the default chunking
    pub fn splitter_for(&self, category: &str) -> Result<TextSplitter> {
        let (size, overlap) = self.config.chunking_for(category);
        TextSplitter::new(size, overlap)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.config
            .exclude_files
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }

    /// Accepted files per category, in directory order; missing categories are recorded
    pub fn scan(&self, docs_dir: &Path, report: &mut IngestReport) -> Vec<ScannedFile> {
        let mut files = Vec::new();

        for category in &self.config.categories {
            let dir = docs_dir.join(&category.name);
            if !dir.is_dir() {
                tracing::warn!("Category directory missing: {}", dir.display());
                report.missing_categories.push(category.name.clone());
                continue;
            }

            let before = files.len();
            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("Cannot read entry under {}: {}", dir.display(), e);
                        continue;
                    }
                };
                let path = entry.path();
                if !entry.file_type().is_file() || self.is_excluded(path) || !category.accepts(path) {
                    continue;
                }
                files.push(ScannedFile {
                    category: category.name.clone(),
                    path: path.to_path_buf(),
                });
            }

            tracing::info!("{}: {} files", category.name, files.len() - before);
        }

        files
    }

    /// Load, clean and split every scanned file
    pub async fn collect_chunks(&self, docs_dir: &Path, report: &mut IngestReport) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();

        for file in self.scan(docs_dir, report) {
            let path = file.path.clone();
            let loaded = tokio::task::spawn_blocking(move || DocumentLoader::load(&path))
                .await
                .map_err(|e| Error::file_parse(&file.path, format!("extractor crashed: {}", e)))
                .and_then(|r| r);

            let docs = match loaded {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", file.path.display(), e);
                    report.skipped.push((file.path, e.to_string()));
                    continue;
                }
            };

            let docs: Vec<Document> = docs
                .into_iter()
                .map(|mut doc| {
                    doc.content = clean_text(&doc.content);
                    doc.metadata
                        .insert(CATEGORY_KEY.to_string(), Value::from(file.category.as_str()));
                    doc
                })
                .filter(|doc| !doc.content.is_empty())
                .collect();

            if docs.is_empty() {
                tracing::warn!("Skipping {}: no text after cleaning", file.path.display());
                report
                    .skipped
                    .push((file.path, "no text after cleaning".to_string()));
                continue;
            }

            let splitter = self.splitter_for(&file.category)?;
            let before = chunks.len();
            for doc in &docs {
                chunks.extend(splitter.split(doc, &file.category, &file.path));
            }
            report.documents_loaded += docs.len();

            tracing::debug!(
                "{}: {} documents, {} chunks",
                file.path.display(),
                docs.len(),
                chunks.len() - before
            );
        }

        Ok(chunks)
    }

    /// Run the whole pipeline and persist the index into `db_dir`
    pub async fn run(&self, docs_dir: &Path, db_dir: &Path) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        tracing::info!("Ingesting {}", docs_dir.display());

        let chunks = self.collect_chunks(docs_dir, &mut report).await?;
        if report.documents_loaded == 0 {
            return Err(Error::NoDocuments(docs_dir.to_path_buf()));
        }

        tracing::info!(
            "Embedding {} chunks from {} documents with {}",
            chunks.len(),
            report.documents_loaded,
            self.embedder.name()
        );
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts, self.concurrency).await?;

        let store = LocalVectorStore::create(db_dir, self.embedder.name(), self.embedder.dimensions());
        let stored: Vec<StoredChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk { chunk, embedding })
            .collect();
        report.chunks_created = stored.len();

        store.insert_chunks(stored).await?;
        store.persist().await?;

        tracing::info!(
            "Knowledge base written to {} ({} chunks, {} skipped files)",
            db_dir.display(),
            report.chunks_created,
            report.skipped.len()
        );
        Ok(report)
    }
}

/// Create the category directories under `docs_dir` and return the tree as text
pub fn scaffold(docs_dir: &Path, categories: &[String]) -> Result<String> {
    let mut tree = String::new();
    let _ = writeln!(tree, "{}/", docs_dir.display());

    for (i, name) in categories.iter().enumerate() {
        std::fs::create_dir_all(docs_dir.join(name))?;
        let branch = if i + 1 == categories.len() { "└──" } else { "├──" };
        let _ = writeln!(tree, "{} {}/", branch, name);
    }

    tracing::info!("Created {} category directories under {}", categories.len(), docs_dir.display());
    Ok(tree)
}
