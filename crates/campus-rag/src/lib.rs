//! campus-rag: knowledge-base chatbot for the Northwest University campus
//!
//! Documents are grouped by category on disk, loaded from PDF, Word, Excel and
//! HTML, split with per-category chunking, embedded through Ollama and kept in
//! a local cosine-similarity index. The chat server answers either from that
//! index or as a plain conversation, with a short memory per session.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use router::{ChatError, QueryRouter};
pub use session::SessionStore;
pub use types::{
    chat::{ChatRequest, ChatResponse},
    document::{Chunk, Document, FileType},
};
