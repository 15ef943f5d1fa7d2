//! Feed enumeration and post text retrieval over HTTP.
//!
//! This crate provides:
//! - [`FeedSource`] — the [`ContentSource`](postfeed_shared::ContentSource) implementation
//! - [`parse_feed`] — RSS/Atom item extraction
//! - [`extract_text`] — readable text from a post's HTML

pub mod extract;
pub mod parse;
pub mod source;

pub use extract::extract_text;
pub use parse::parse_feed;
pub use source::{FeedSource, FeedSourceConfig};
