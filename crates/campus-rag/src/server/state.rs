//! Application state for the chat server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, LlmProvider, LocalVectorStore, OllamaProvider};
use crate::retrieval::KnowledgeRetriever;
use crate::router::QueryRouter;
use crate::session::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    router: Arc<QueryRouter>,
}

impl AppState {
    /// Build state against Ollama, loading the knowledge base when one exists
    pub async fn new(config: RagConfig) -> Result<Self> {
        let (embedder, llm) = OllamaProvider::new(&config.llm, config.embeddings.dimensions)?.split();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(embedder);
        let llm: Arc<dyn LlmProvider> = Arc::new(llm);

        let retriever = Self::load_knowledge(&config, embedder).await?;
        Ok(Self::with_providers(config, llm, retriever))
    }

    /// Build state from ready-made providers
    pub fn with_providers(
        config: RagConfig,
        llm: Arc<dyn LlmProvider>,
        retriever: Option<Arc<KnowledgeRetriever>>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.chat.memory_window));
        let router = QueryRouter::new(llm, retriever, sessions, &config.chat);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                router: Arc::new(router),
            }),
        }
    }

    /// Open the persisted index; `None` when no knowledge base has been built
    async fn load_knowledge(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Option<Arc<KnowledgeRetriever>>> {
        let db_dir = &config.knowledge.db_dir;
        if !LocalVectorStore::exists(db_dir) {
            tracing::warn!(
                "No knowledge base at {}; knowledge requests will get 503 until ingestion runs",
                db_dir.display()
            );
            return Ok(None);
        }

        let store = LocalVectorStore::open(db_dir)?;
        if store.embedding_model() != embedder.name() {
            tracing::warn!(
                "Knowledge base was embedded with {}, serving with {}",
                store.embedding_model(),
                embedder.name()
            );
        }

        let retriever = KnowledgeRetriever::new(embedder, Arc::new(store), &config.retrieval);
        if config.embeddings.verify_dimensions {
            match retriever.verify_dimensions().await {
                Ok(()) => tracing::info!("Embedding dimensions verified"),
                Err(e @ Error::Config(_)) => return Err(e),
                Err(e) => tracing::warn!("Could not verify embedding dimensions: {}", e),
            }
        }

        Ok(Some(Arc::new(retriever)))
    }

    /// Configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Query router
    pub fn router(&self) -> Arc<QueryRouter> {
        Arc::clone(&self.inner.router)
    }
}
