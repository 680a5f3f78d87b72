//! Error types for the campus knowledge base

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for campus-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File parsing error, always tagged with the offending path
    #[error("Failed to load {}: {message}", path.display())]
    FileParse { path: PathBuf, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Ingestion found nothing to index
    #[error("No documents found under {}", .0.display())]
    NoDocuments(PathBuf),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector store error
    #[error("Vector store error: {0}")]
    VectorDb(String),

    /// Ollama/LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::FileParse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector store error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_parse_mentions_path() {
        let err = Error::file_parse("数据集/竞赛相关/broken.pdf", "bad xref table");
        let msg = err.to_string();
        assert!(msg.contains("broken.pdf"));
        assert!(msg.contains("bad xref table"));
    }
}
