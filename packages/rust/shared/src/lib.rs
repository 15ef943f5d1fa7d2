//! Shared types, error model, collaborator traits, and configuration for postfeed.
//!
//! This crate is the foundation depended on by all other postfeed crates.
//! It provides:
//! - [`PostfeedError`]: the unified error type for collaborators
//! - Domain types ([`FeedItem`], [`PostId`], [`Summary`], [`Document`])
//! - Collaborator traits ([`ContentSource`], [`NlpService`], [`PostStore`], [`PostArchive`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FeedConfig, OpenAiConfig, ScheduleConfig, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{PostfeedError, Result};
pub use traits::{ContentSource, NlpService, PostArchive, PostStore};
pub use types::{Document, FeedItem, PostId, RawText, Summary, SummaryFile};
