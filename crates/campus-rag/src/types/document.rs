//! Document and chunk types flowing through ingestion

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Metadata attached to documents and chunks
pub type Metadata = BTreeMap<String, Value>;

/// Metadata key for the category a document belongs to
pub const CATEGORY_KEY: &str = "category";
/// Metadata key for the file a document was loaded from
pub const SOURCE_PATH_KEY: &str = "source_path";
/// Metadata key for the position of a chunk within its parent
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key for the character offset of a chunk within its parent
pub const START_INDEX_KEY: &str = "start_index";

/// Formats the loader knows how to extract
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Word document (.docx)
    Docx,
    /// Word 97-2003 document (.doc)
    Doc,
    /// Excel workbook (.xlsx, .xls)
    Xlsx,
    /// HTML page
    Html,
    /// Anything else, read as text
    Other,
}

impl FileType {
    /// Detect file type from an extension, with or without the leading dot
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "doc" => Self::Doc,
            "xlsx" | "xls" => Self::Xlsx,
            "html" | "htm" => Self::Html,
            _ => Self::Other,
        }
    }

    /// Detect file type from a path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Other)
    }

    /// Short lowercase name used in metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Xlsx => "xlsx",
            Self::Html => "html",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted text plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content
    pub content: String,
    /// Metadata (category, source_path, ...)
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with empty metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata insert
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Category name, if set
    pub fn category(&self) -> Option<&str> {
        self.metadata.get(CATEGORY_KEY).and_then(Value::as_str)
    }

    /// Source path, if set
    pub fn source_path(&self) -> Option<&str> {
        self.metadata.get(SOURCE_PATH_KEY).and_then(Value::as_str)
    }
}

/// A bounded slice of a document, ready for embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from source, position and content
    pub id: String,
    /// Text content
    pub content: String,
    /// Parent metadata plus chunk_index and start_index
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk, deriving its id from the metadata and content
    pub fn new(content: String, metadata: Metadata) -> Self {
        let mut hasher = Sha256::new();
        if let Some(source) = metadata.get(SOURCE_PATH_KEY).and_then(Value::as_str) {
            hasher.update(source.as_bytes());
        }
        if let Some(index) = metadata.get(CHUNK_INDEX_KEY).and_then(Value::as_u64) {
            hasher.update(index.to_le_bytes());
        }
        hasher.update(content.as_bytes());
        let id = hex::encode(&hasher.finalize()[..16]);

        Self {
            id,
            content,
            metadata,
        }
    }

    /// Source path, if set
    pub fn source_path(&self) -> Option<&str> {
        self.metadata.get(SOURCE_PATH_KEY).and_then(Value::as_str)
    }

    /// Position within the parent document
    pub fn chunk_index(&self) -> Option<u64> {
        self.metadata.get(CHUNK_INDEX_KEY).and_then(Value::as_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension(".docx"), FileType::Docx);
        assert_eq!(FileType::from_extension("doc"), FileType::Doc);
        assert_eq!(FileType::from_extension("xls"), FileType::Xlsx);
        assert_eq!(FileType::from_extension("HTM"), FileType::Html);
        assert_eq!(FileType::from_extension("txt"), FileType::Other);
        assert_eq!(FileType::from_extension(""), FileType::Other);
        assert_eq!(FileType::from_path(Path::new("数据集/竞赛相关/通知.Pdf")), FileType::Pdf);
        assert_eq!(FileType::from_path(Path::new("README")), FileType::Other);
    }

    #[test]
    fn test_document_accessors() {
        let doc = Document::new("校历")
            .with_metadata(CATEGORY_KEY, "日常生活相关")
            .with_metadata(SOURCE_PATH_KEY, "数据集/日常生活相关/校历.docx");
        assert_eq!(doc.category(), Some("日常生活相关"));
        assert_eq!(doc.source_path(), Some("数据集/日常生活相关/校历.docx"));
    }

    #[test]
    fn test_chunk_id_depends_on_position() {
        let mut meta = Metadata::new();
        meta.insert(SOURCE_PATH_KEY.into(), "a.pdf".into());
        meta.insert(CHUNK_INDEX_KEY.into(), 0.into());
        let first = Chunk::new("same".into(), meta.clone());
        meta.insert(CHUNK_INDEX_KEY.into(), 1.into());
        let second = Chunk::new("same".into(), meta);
        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 32);
        assert_eq!(second.chunk_index(), Some(1));
    }
}
