//! Summarization and retrieval indexing against an OpenAI-compatible API.

pub mod index;
pub mod service;

pub use index::{IndexFile, IndexedDocument, read_index};
pub use service::{EMBED_BATCH_SIZE, NlpConfig, OpenAiNlp, truncate_chars};
