//! Provider abstractions for embeddings, LLM and vector storage
//!
//! Trait-based seams so the router and ingestion pipeline can run against
//! Ollama in production and stubs in tests.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use local::LocalVectorStore;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use vector_store::{StoredChunk, VectorSearchResult, VectorStoreProvider};
