//! Application configuration for postfeed.
//!
//! User config lives at `~/.postfeed/postfeed.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PostfeedError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "postfeed.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".postfeed";

// ---------------------------------------------------------------------------
// Config structs (matching postfeed.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Feed source settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// OpenAI-compatible API settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Database and index locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduled update settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// `[feed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Address of the author's RSS/Atom feed.
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Links containing any of these substrings are never processed.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            exclude_patterns: default_exclude_patterns(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_feed_url() -> String {
    "http://www.aaronsw.com/2002/feeds/pgessays.rss".into()
}
fn default_exclude_patterns() -> Vec<String> {
    // Common Lisp book chapters share this link fragment.
    vec!["1638975042".into()]
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Chat model used for summaries.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// Embedding model used for the retrieval index.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Post text beyond this many characters is cut before summarizing.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Document text beyond this many characters is cut before embedding.
    #[serde(default = "default_max_embed_chars")]
    pub max_embed_chars: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            api_base: default_api_base(),
            summary_model: default_summary_model(),
            embedding_model: default_embedding_model(),
            max_input_chars: default_max_input_chars(),
            max_embed_chars: default_max_embed_chars(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_summary_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_max_input_chars() -> usize {
    12_000
}
fn default_max_embed_chars() -> usize {
    // Stays under the 8191-token input limit of the OpenAI embedding models.
    8_000
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database holding summaries, texts, and the corpus.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// JSON file holding the embedded retrieval index.
    #[serde(default = "default_index_path")]
    pub index_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            index_path: default_index_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/postfeed.db".into()
}
fn default_index_path() -> String {
    "var/index.json".into()
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between runs in `watch` mode.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.postfeed/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PostfeedError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.postfeed/postfeed.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PostfeedError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PostfeedError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PostfeedError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PostfeedError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PostfeedError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in the config.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(PostfeedError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
