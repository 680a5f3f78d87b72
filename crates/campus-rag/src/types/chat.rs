//! Wire types for `POST /chat/generate`

use serde::{Deserialize, Deserializer, Serialize};

/// `code` value carried by every successful reply
pub const SUCCESS_CODE: u16 = 100;

/// Chat request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User question
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,

    /// Existing session to continue; a new one is minted when absent or empty
    #[serde(default)]
    pub session_id: Option<String>,

    /// Ground the answer in the knowledge base
    #[serde(default, deserialize_with = "null_as_default")]
    pub use_knowledge: bool,
}

/// Explicit `null` reads the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatRequest {
    /// Create a conversational request
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Continue an existing session
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Request knowledge grounding
    pub fn with_knowledge(mut self) -> Self {
        self.use_knowledge = true;
        self
    }
}

/// Successful chat reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Always [`SUCCESS_CODE`]
    pub code: u16,
    /// Answer text
    pub data: String,
    /// Session the turn belongs to
    pub session_id: String,
    /// Whether retrieved passages grounded the answer
    pub is_knowledge_based: bool,
    /// Source file names backing a knowledge-grounded answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl ChatResponse {
    /// Plain conversational reply
    pub fn conversational(answer: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            code: SUCCESS_CODE,
            data: answer.into(),
            session_id: session_id.into(),
            is_knowledge_based: false,
            sources: None,
        }
    }

    /// Reply grounded in the listed sources
    pub fn knowledge(
        answer: impl Into<String>,
        session_id: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            code: SUCCESS_CODE,
            data: answer.into(),
            session_id: session_id.into(),
            is_knowledge_based: true,
            sources: Some(sources),
        }
    }
}

/// Error reply body; `code` mirrors the HTTP status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatErrorBody {
    /// HTTP status code
    pub code: u16,
    /// Human-readable message
    pub error: String,
    /// Session the request belonged to
    pub session_id: String,
}
