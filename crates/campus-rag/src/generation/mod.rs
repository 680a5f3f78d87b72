//! Reply generation: Ollama client and prompt templates

pub mod ollama;
pub mod prompt;

pub use ollama::{strip_reasoning, OllamaClient};
pub use prompt::PromptBuilder;
