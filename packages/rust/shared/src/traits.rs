//! Collaborator contracts consumed by the update orchestrator.
//!
//! Each trait is implemented by one concrete crate (`postfeed-feed`,
//! `postfeed-nlp`, `postfeed-storage`) and by in-memory fakes in tests.
//! Every call is awaited before the next one begins; implementations do not
//! need to tolerate concurrent use from a single run.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Document, FeedItem, PostId, Summary};

/// Feed enumeration and article text retrieval.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List every item currently published in the feed, in feed order.
    async fn get_items(&self, feed_url: &str) -> Result<Vec<FeedItem>>;

    /// Fetch the full extracted text of one post.
    async fn get_text(&self, link: &str) -> Result<String>;
}

/// Summarization and retrieval indexing.
#[async_trait]
pub trait NlpService: Send + Sync {
    /// Produce a condensed summary of `text`.
    async fn summarize(&self, text: &str) -> Result<String>;

    /// Replace the full retrieval index with `documents`.
    async fn index(&self, documents: &[Document]) -> Result<()>;
}

/// Durable storage of identifiers, summaries, raw text, and the corpus.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Identifiers of every stored summary.
    async fn list_ids(&self) -> Result<Vec<PostId>>;

    async fn store_summary(&self, summary: &Summary) -> Result<()>;

    async fn store_text(&self, id: &PostId, text: &str) -> Result<()>;

    /// The persisted corpus, in insertion order.
    async fn get_documents(&self) -> Result<Vec<Document>>;

    /// Replace the persisted corpus with `documents`, preserving order.
    async fn store_documents(&self, documents: &[Document]) -> Result<()>;
}

/// Read access to stored posts for maintenance outside the update run.
#[async_trait]
pub trait PostArchive: PostStore {
    /// Every stored summary, oldest first.
    async fn list_summaries(&self) -> Result<Vec<Summary>>;

    /// Stored raw text for `id`, if any.
    async fn load_text(&self, id: &PostId) -> Result<Option<String>>;
}
