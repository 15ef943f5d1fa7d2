//! Core domain types for postfeed.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::error::{PostfeedError, Result};

// ---------------------------------------------------------------------------
// PostId
// ---------------------------------------------------------------------------

/// Stable short key for a post, derived from its canonical link.
///
/// Used as the primary key across summaries, raw text, and corpus documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Wrap an already-derived identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PostId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// FeedItem
// ---------------------------------------------------------------------------

/// One entry from the author's feed. Scoped to a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Canonical post URL.
    pub link: String,
    /// Post title as published in the feed.
    pub title: String,
}

// ---------------------------------------------------------------------------
// Summary / RawText
// ---------------------------------------------------------------------------

/// Summary record persisted once per new post.
///
/// Field names match the `{"Items": [...]}` export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub id: PostId,
    pub url: String,
    pub title: String,
    pub summary: String,
}

/// Full extracted text of a post, stored next to its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawText {
    pub id: PostId,
    pub text: String,
}

/// Summaries file exchanged by the `summaries` commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFile {
    #[serde(rename = "Items")]
    pub items: Vec<Summary>,
}

impl SummaryFile {
    /// Reject entries that could not have come from a stored post.
    pub fn validate(&self) -> Result<()> {
        for (n, item) in self.items.iter().enumerate() {
            if item.id.as_str().trim().is_empty() {
                return Err(PostfeedError::validation(format!("item {n} has an empty id")));
            }
            if item.url.trim().is_empty() {
                return Err(PostfeedError::validation(format!(
                    "item {n} ({}) has an empty url",
                    item.id
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A retrieval corpus entry. At most one per [`PostId`] in any corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier of the post this document was built from.
    pub metadata: PostId,
    /// Title and body text.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn post_id_displays_raw_value() {
        let id = PostId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn post_id_set_lookup_by_str() {
        let set: HashSet<PostId> = ["a", "b"].into_iter().map(PostId::from).collect();
        assert!(set.contains("a"));
        assert!(!set.contains("c"));
    }

    #[test]
    fn summary_uses_export_field_names() {
        let summary = Summary {
            id: PostId::new("abc123"),
            url: "http://x.com/abc123.html".into(),
            title: "T".into(),
            summary: "sum".into(),
        };
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["id"], "abc123");
        assert_eq!(json["url"], "http://x.com/abc123.html");
        assert_eq!(json["summary"], "sum");
    }

    #[test]
    fn summary_file_uses_items_key() {
        let json = r#"{"Items":[{"id":"a","url":"http://x.com/a.html","title":"A","summary":"s"}]}"#;
        let file: SummaryFile = serde_json::from_str(json).expect("parse");
        assert_eq!(file.items.len(), 1);
        assert_eq!(file.items[0].id, PostId::new("a"));
        assert_eq!(serde_json::to_string(&file).expect("serialize"), json);
    }

    #[test]
    fn summary_file_rejects_blank_ids() {
        let mut file = SummaryFile {
            items: vec![Summary {
                id: PostId::new("a"),
                url: "http://x.com/a.html".into(),
                title: "A".into(),
                summary: "s".into(),
            }],
        };
        assert!(file.validate().is_ok());

        file.items[0].id = PostId::new(" ");
        let err = file.validate().unwrap_err();
        assert!(matches!(err, PostfeedError::Validation { .. }));
    }

    #[test]
    fn document_serializes_metadata_as_string() {
        let doc = Document {
            metadata: PostId::new("abc123"),
            text: "T body".into(),
        };
        let json = serde_json::to_string(&doc).expect("serialize");
        assert_eq!(json, r#"{"metadata":"abc123","text":"T body"}"#);
    }
}
