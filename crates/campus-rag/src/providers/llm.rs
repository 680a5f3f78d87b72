//! LLM provider trait for generating replies

use async_trait::async_trait;

use crate::error::Result;

/// Trait for language-model text generation
///
/// Implementations:
/// - `OllamaLlm`: local Ollama server
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete `prompt`, optionally steered by a system instruction
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model in use
    fn model(&self) -> &str;
}
