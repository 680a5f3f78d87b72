//! Query routing between knowledge-grounded answers and plain conversation

use std::sync::Arc;
use thiserror::Error;

use crate::config::ChatConfig;
use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::retrieval::{source_names, KnowledgeRetriever};
use crate::session::{ConversationMemory, SessionStore};
use crate::types::{ChatErrorBody, ChatRequest, ChatResponse};

/// Request failures that reach the caller
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Blank prompt, rejected before any downstream call
    #[error("问题不能为空")]
    EmptyPrompt { session_id: String },

    /// Body is not a valid chat request
    #[error("请求格式错误: {message}")]
    MalformedRequest { session_id: String, message: String },

    /// Knowledge grounding requested but no knowledge base is loaded
    #[error("知识库未就绪")]
    KnowledgeUnavailable { session_id: String },

    /// Unexpected failure while handling the request
    #[error("服务器内部错误")]
    Internal { session_id: String, message: String },
}

impl ChatError {
    /// HTTP status, also sent as `code`
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyPrompt { .. } | Self::MalformedRequest { .. } => 400,
            Self::KnowledgeUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    /// Session the failed request belonged to
    pub fn session_id(&self) -> &str {
        match self {
            Self::EmptyPrompt { session_id }
            | Self::MalformedRequest { session_id, .. }
            | Self::KnowledgeUnavailable { session_id }
            | Self::Internal { session_id, .. } => session_id,
        }
    }

    /// Wire body
    pub fn body(&self) -> ChatErrorBody {
        ChatErrorBody {
            code: self.status_code(),
            error: self.to_string(),
            session_id: self.session_id().to_string(),
        }
    }
}

/// Routes each chat turn and keeps session memory
pub struct QueryRouter {
    llm: Arc<dyn LlmProvider>,
    retriever: Option<Arc<KnowledgeRetriever>>,
    sessions: Arc<SessionStore>,
    system_prompt: String,
    degraded_reply: String,
}

impl QueryRouter {
    /// Create a router; `retriever` is `None` when no knowledge base is loaded
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retriever: Option<Arc<KnowledgeRetriever>>,
        sessions: Arc<SessionStore>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            llm,
            retriever,
            sessions,
            system_prompt: config.system_prompt.clone(),
            degraded_reply: config.degraded_reply.clone(),
        }
    }

    /// Whether knowledge-grounded answers are available
    pub fn has_knowledge(&self) -> bool {
        self.retriever.is_some()
    }

    /// Whether the generation model answers its health check
    pub async fn llm_available(&self) -> bool {
        match self.llm.health_check().await {
            Ok(up) => up,
            Err(e) => {
                tracing::warn!("LLM health check failed: {}", e);
                false
            }
        }
    }

    /// Session store backing this router
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer one chat turn
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let session_id = SessionStore::resolve_id(request.session_id.as_deref());
        let question = request.prompt.trim();

        if question.is_empty() {
            return Err(ChatError::EmptyPrompt { session_id });
        }

        if !request.use_knowledge {
            let handle = self.sessions.session(&session_id);
            let mut memory = handle.lock().await;
            return Ok(self.converse(&mut memory, question, session_id).await);
        }

        let Some(retriever) = &self.retriever else {
            return Err(ChatError::KnowledgeUnavailable { session_id });
        };

        let handle = self.sessions.session(&session_id);
        let mut memory = handle.lock().await;

        match retriever.retrieve(question).await {
            Ok(passages) if !passages.is_empty() => {
                let context = PromptBuilder::build_context(&passages);
                let prompt = PromptBuilder::knowledge_prompt(&memory.render(), &context, question);

                match self.llm.generate(&prompt, Some(&self.system_prompt)).await {
                    Ok(answer) => {
                        tracing::info!(
                            "Session {}: knowledge answer from {} passages",
                            session_id,
                            passages.len()
                        );
                        memory.push(question, answer.clone());
                        Ok(ChatResponse::knowledge(answer, session_id, source_names(&passages)))
                    }
                    Err(e) => Ok(self.degraded(e, session_id)),
                }
            }
            Ok(_) => {
                tracing::warn!("No passages matched '{}', falling back to conversation", question);
                Ok(self.converse(&mut memory, question, session_id).await)
            }
            Err(e) => {
                tracing::warn!("Retrieval failed: {}, falling back to conversation", e);
                Ok(self.converse(&mut memory, question, session_id).await)
            }
        }
    }

    async fn converse(
        &self,
        memory: &mut ConversationMemory,
        question: &str,
        session_id: String,
    ) -> ChatResponse {
        let prompt = PromptBuilder::conversation_prompt(&memory.render(), question);

        match self.llm.generate(&prompt, Some(&self.system_prompt)).await {
            Ok(answer) => {
                memory.push(question, answer.clone());
                ChatResponse::conversational(answer, session_id)
            }
            Err(e) => self.degraded(e, session_id),
        }
    }

    fn degraded(&self, error: crate::error::Error, session_id: String) -> ChatResponse {
        tracing::error!("Model call failed for session {}: {}", session_id, error);
        ChatResponse::conversational(self.degraded_reply.clone(), session_id)
    }
}
