//! Step-tagged errors returned by an update run.

use postfeed_shared::PostfeedError;

/// Terminal failure of an update run.
///
/// Each variant names the step that failed and carries the collaborator's
/// error unchanged as its source. The run stops at the first one.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Enumerating the feed failed.
    #[error("failed to fetch feed items")]
    Fetch(#[source] PostfeedError),

    /// Listing identifiers or reading the corpus failed.
    #[error("failed to read from store")]
    StoreRead(#[source] PostfeedError),

    /// Fetching a post's text failed.
    #[error("failed to fetch text for {link}")]
    ContentFetch {
        link: String,
        #[source]
        source: PostfeedError,
    },

    #[error("failed to summarize {id}")]
    Summarization {
        id: String,
        #[source]
        source: PostfeedError,
    },

    #[error("failed to store summary for {id}")]
    PersistSummary {
        id: String,
        #[source]
        source: PostfeedError,
    },

    #[error("failed to store text for {id}")]
    PersistText {
        id: String,
        #[source]
        source: PostfeedError,
    },

    /// Pushing the grown corpus into the retrieval index failed.
    #[error("failed to update retrieval index")]
    IndexUpdate(#[source] PostfeedError),

    #[error("failed to store corpus")]
    PersistCorpus(#[source] PostfeedError),
}

impl UpdateError {
    /// Stable tag for the failing step, used in logs and exit messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "FetchError",
            Self::StoreRead(_) => "StoreReadError",
            Self::ContentFetch { .. } => "ContentFetchError",
            Self::Summarization { .. } => "SummarizationError",
            Self::PersistSummary { .. } => "PersistSummaryError",
            Self::PersistText { .. } => "PersistTextError",
            Self::IndexUpdate(_) => "IndexUpdateError",
            Self::PersistCorpus(_) => "PersistCorpusError",
        }
    }

    /// The collaborator error that ended the run.
    pub fn collaborator_error(&self) -> &PostfeedError {
        match self {
            Self::Fetch(e) | Self::StoreRead(e) | Self::IndexUpdate(e) | Self::PersistCorpus(e) => e,
            Self::ContentFetch { source, .. }
            | Self::Summarization { source, .. }
            | Self::PersistSummary { source, .. }
            | Self::PersistText { source, .. } => source,
        }
    }
}
