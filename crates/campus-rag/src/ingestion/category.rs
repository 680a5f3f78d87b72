//! Per-category chunking parameters and accepted file types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::splitter::TextSplitter;
use crate::error::{Error, Result};

/// Chunking rules for one document category (a subdirectory of the docs root)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Category name, also the directory name
    pub name: String,
    /// Chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Extensions ingested for this category, e.g. `.pdf`
    pub accepted_extensions: BTreeSet<String>,
}

impl CategoryConfig {
    /// Create a category
    pub fn new(name: impl Into<String>, chunk_size: usize, chunk_overlap: usize, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            chunk_size,
            chunk_overlap,
            accepted_extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
        }
    }

    /// The campus document categories
    pub fn campus_defaults() -> Vec<Self> {
        vec![
            Self::new("培养方案相关", 1500, 400, &[".pdf"]),
            Self::new("日常生活相关", 800, 150, &[".docx", ".pdf"]),
            Self::new("竞赛相关", 1000, 200, &[".pdf"]),
            Self::new("课程、考试资源相关", 1200, 300, &[".pdf", ".docx", ".doc"]),
            Self::new("选课考试相关", 1000, 250, &[".docx", ".pdf", ".doc", ".xlsx"]),
        ]
    }

    /// Reject parameters the splitter cannot honor
    pub fn validate(&self) -> Result<()> {
        TextSplitter::new(self.chunk_size, self.chunk_overlap)
            .map(|_| ())
            .map_err(|e| Error::Config(format!("category {}: {}", self.name, e)))
    }

    /// Case-insensitive extension check; the leading dot is optional
    pub fn accepts_extension(&self, ext: &str) -> bool {
        let wanted = normalize_extension(ext);
        self.accepted_extensions
            .iter()
            .any(|e| normalize_extension(e) == wanted)
    }

    /// Whether a file should be ingested under this category
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.accepts_extension(e))
    }
}

/// Lowercase with a single leading dot
pub fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim().trim_start_matches('.').to_lowercase())
}
