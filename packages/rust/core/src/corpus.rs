//! Append-only corpus extension with a per-identifier duplicate guard.
//!
//! The corpus is a plain ordered `Vec<Document>` searched linearly. Corpora
//! stay at single-author blog scale, and insertion order must survive
//! round trips through the index and the store.

use postfeed_shared::{Document, PostId};

/// Text stored for a post in the corpus: its title, a space, then the body.
pub fn document_text(title: &str, body: &str) -> String {
    format!("{title} {body}")
}

/// Extend `corpus` with a document for `id`, unless one already exists.
///
/// Existing entries are never touched. When `id` is absent a new document
/// is appended at the end.
pub fn extend(mut corpus: Vec<Document>, id: &PostId, text: impl Into<String>) -> Vec<Document> {
    if contains(&corpus, id) {
        return corpus;
    }
    corpus.push(Document {
        metadata: id.clone(),
        text: text.into(),
    });
    corpus
}

/// Whether the corpus already holds a document for `id`.
pub fn contains(corpus: &[Document], id: &PostId) -> bool {
    corpus.iter().any(|doc| &doc.metadata == id)
}
