//! Core types for the campus knowledge base

pub mod chat;
pub mod document;

pub use chat::{ChatErrorBody, ChatRequest, ChatResponse, SUCCESS_CODE};
pub use document::{Chunk, Document, FileType, Metadata};
