//! Document ingestion: category scan, multi-format loading, cleaning, splitting

mod category;
mod cleaner;
mod loader;
mod processor;
mod splitter;
mod word97;

pub use category::{normalize_extension, CategoryConfig};
pub use cleaner::{clean_text, MAX_LINES};
pub use loader::{extractor_for, DocumentLoader, Extractor};
pub use processor::{scaffold, IngestPipeline, IngestReport, ScannedFile};
pub use splitter::TextSplitter;
