//! Configuration for the campus knowledge base and chat server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingestion::CategoryConfig;

/// Environment variable naming a TOML config file
pub const CONFIG_ENV_VAR: &str = "CAMPUS_RAG_CONFIG";

/// Most retries allowed per Ollama request
pub const MAX_LLM_RETRIES: u32 = 10;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Conversation configuration
    pub chat: ChatConfig,
    /// Knowledge base location
    pub knowledge: KnowledgeConfig,
    /// Document ingestion configuration
    pub ingestion: IngestionConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file; omitted sections keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, then `CAMPUS_RAG_CONFIG`, then defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        for category in &self.ingestion.categories {
            category.validate()?;
        }
        if self.ingestion.default_chunk_overlap >= self.ingestion.default_chunk_size {
            return Err(Error::Config(format!(
                "default chunk_overlap ({}) must be smaller than default chunk_size ({})",
                self.ingestion.default_chunk_overlap, self.ingestion.default_chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(Error::Config(format!(
                "similarity_threshold must be within 0.0..=1.0, got {}",
                self.retrieval.similarity_threshold
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
        }
        if self.llm.max_retries > MAX_LLM_RETRIES {
            return Err(Error::Config(format!(
                "llm.max_retries must be at most {}, got {}",
                MAX_LLM_RETRIES, self.llm.max_retries
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be positive".to_string()));
        }
        if self.chat.memory_window == 0 {
            return Err(Error::Config("chat.memory_window must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            enable_cors: true,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Context window size (tokens), sent as `num_ctx`
    pub context_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "deepseek-r1:14b".to_string(),
            generate_model: "deepseek-r1:14b".to_string(),
            temperature: 0.1,
            context_size: 5120,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimensions produced by the embedding model
    pub dimensions: usize,
    /// Embed a sample text at startup and refuse to serve on a dimension mismatch
    pub verify_dimensions: bool,
    /// Concurrent embedding requests during ingestion
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 5120,
            verify_dimensions: true,
            concurrency: 4,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of passages to retrieve
    pub top_k: usize,
    /// Minimum cosine similarity for a passage to count as a match
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.4,
        }
    }
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Exchanges kept per session
    pub memory_window: usize,
    /// Answer returned when the language model cannot be reached
    pub degraded_reply: String,
    /// Persona instruction sent as the system prompt
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            memory_window: 5,
            degraded_reply: "当前服务不可用，请稍后再试".to_string(),
            system_prompt: "你是\"西小北\"，西北大学官方校园AI助手。请始终以西小北的身份、用中文回答。"
                .to_string(),
        }
    }
}

/// Knowledge base location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory holding the persisted vector index
    pub db_dir: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("./nwu_knowledge_v1"),
        }
    }
}

/// Document ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Root directory of the category tree
    pub docs_dir: PathBuf,
    /// Per-category chunking and accepted extensions
    pub categories: Vec<CategoryConfig>,
    /// Directories created when scaffolding an empty docs root
    pub scaffold_categories: Vec<String>,
    /// File names skipped during the scan
    pub exclude_files: Vec<String>,
    /// Chunk size for documents whose category has no entry
    pub default_chunk_size: usize,
    /// Chunk overlap for documents whose category has no entry
    pub default_chunk_overlap: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        let categories = CategoryConfig::campus_defaults();
        let mut scaffold_categories: Vec<String> =
            categories.iter().map(|c| c.name.clone()).collect();
        scaffold_categories.push("学校概况".to_string());

        Self {
            docs_dir: PathBuf::from("./数据集"),
            categories,
            scaffold_categories,
            exclude_files: vec![".DS_Store".to_string(), "Thumbs.db".to_string()],
            default_chunk_size: 1000,
            default_chunk_overlap: 200,
        }
    }
}

impl IngestionConfig {
    /// Look up a category by name
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Chunking parameters for a category, falling back to the defaults
    pub fn chunking_for(&self, name: &str) -> (usize, usize) {
        self.category(name)
            .map(|c| (c.chunk_size, c.chunk_overlap))
            .unwrap_or((self.default_chunk_size, self.default_chunk_overlap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingestion.categories.len(), 5);
        assert_eq!(config.ingestion.scaffold_categories.len(), 6);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.chat.memory_window, 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            [server]
            port = 8088

            [retrieval]
            similarity_threshold = 0.55
        "#;
        let config: RagConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!((config.retrieval.similarity_threshold - 0.55).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.ingestion.categories.len(), 5);
    }

    #[test]
    fn test_custom_categories_from_toml() {
        let raw = r#"
            [ingestion]
            docs_dir = "/srv/docs"

            [[ingestion.categories]]
            name = "notices"
            chunk_size = 300
            chunk_overlap = 50
            accepted_extensions = [".TXT", "md"]
        "#;
        let config: RagConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        let notices = config.ingestion.category("notices").unwrap();
        assert!(notices.accepts_extension("txt"));
        assert!(notices.accepts_extension(".md"));
        assert_eq!(config.ingestion.chunking_for("notices"), (300, 50));
        assert_eq!(config.ingestion.chunking_for("unknown"), (1000, 200));
    }

    #[test]
    fn test_rejects_bad_overlap() {
        let mut config = RagConfig::default();
        config.ingestion.categories[0].chunk_overlap = config.ingestion.categories[0].chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let config: RagConfig = toml::from_str("[retrieval]\ntop_k = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_bounds_max_retries() {
        let mut config = RagConfig::default();
        config.llm.max_retries = MAX_LLM_RETRIES;
        assert!(config.validate().is_ok());

        config.llm.max_retries = 64;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campus.toml");
        std::fs::write(&path, "[chat]\nmemory_window = 3\n").unwrap();
        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.chat.memory_window, 3);

        std::fs::write(&path, "[chat]\nmemory_window = 0\n").unwrap();
        assert!(RagConfig::from_file(&path).is_err());
    }
}
