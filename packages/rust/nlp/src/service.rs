//! OpenAI-compatible summarization and embedding client.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use postfeed_shared::{AppConfig, Document, NlpService, PostfeedError, Result};

use crate::index::{IndexFile, IndexedDocument, write_index};

/// Maximum inputs per embeddings request.
pub const EMBED_BATCH_SIZE: usize = 64;

const SUMMARY_PROMPT: &str = "You summarize essays. Reply with a concise summary of the \
essay's main argument and key points in a single paragraph of plain prose.";

/// Connection and model settings for [`OpenAiNlp`].
#[derive(Debug, Clone)]
pub struct NlpConfig {
    pub api_key: String,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub summary_model: String,
    pub embedding_model: String,
    /// Input longer than this many characters is cut before summarizing.
    pub max_input_chars: usize,
    /// Document text longer than this many characters is cut before embedding.
    pub max_embed_chars: usize,
    /// Where the retrieval index is written.
    pub index_path: PathBuf,
    pub timeout: Duration,
}

impl NlpConfig {
    /// Settings from the app config plus an already-resolved API key.
    pub fn from_app(config: &AppConfig, api_key: String) -> Self {
        Self {
            api_key,
            api_base: config.openai.api_base.clone(),
            summary_model: config.openai.summary_model.clone(),
            embedding_model: config.openai.embedding_model.clone(),
            max_input_chars: config.openai.max_input_chars,
            max_embed_chars: config.openai.max_embed_chars,
            index_path: PathBuf::from(&config.storage.index_path),
            timeout: Duration::from_secs(120),
        }
    }
}

/// [`NlpService`] over an OpenAI-compatible HTTP API.
pub struct OpenAiNlp {
    config: NlpConfig,
    client: Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiNlp {
    pub fn new(config: NlpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PostfeedError::Nlp(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_base.trim_end_matches('/'))
    }

    /// POST a JSON body and decode the JSON response.
    async fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PostfeedError::Nlp(format!("{url}: request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PostfeedError::Nlp(format!("{url}: HTTP {status}: {detail}")));
        }

        response
            .json()
            .await
            .map_err(|e| PostfeedError::Nlp(format!("{url}: invalid response: {e}")))
    }

    /// Embed one batch, returning vectors in input order.
    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.config.embedding_model,
            "input": inputs,
        });
        let response: EmbeddingResponse = self.post("embeddings", &body).await?;

        if response.data.len() != inputs.len() {
            return Err(PostfeedError::Nlp(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(PostfeedError::Nlp(
                "embedding indices do not cover the batch exactly once".into(),
            ));
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl NlpService for OpenAiNlp {
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    async fn summarize(&self, text: &str) -> Result<String> {
        let input = truncate_chars(text, self.config.max_input_chars);
        if input.len() < text.len() {
            warn!(max_chars = self.config.max_input_chars, "input truncated for summarization");
        }

        let body = json!({
            "model": self.config.summary_model,
            "messages": [
                { "role": "system", "content": SUMMARY_PROMPT },
                { "role": "user", "content": input },
            ],
        });
        let response: ChatResponse = self.post("chat/completions", &body).await?;

        let summary = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PostfeedError::Nlp("empty summary in response".into()))?;

        debug!(summary_chars = summary.chars().count(), "summary generated");
        Ok(summary)
    }

    #[instrument(skip_all, fields(documents = documents.len()))]
    async fn index(&self, documents: &[Document]) -> Result<()> {
        let mut indexed = Vec::with_capacity(documents.len());

        for (batch_no, batch) in documents.chunks(EMBED_BATCH_SIZE).enumerate() {
            let inputs: Vec<&str> = batch
                .iter()
                .map(|d| truncate_chars(&d.text, self.config.max_embed_chars))
                .collect();
            let cut = batch
                .iter()
                .zip(&inputs)
                .filter(|(d, input)| input.len() < d.text.len())
                .count();
            if cut > 0 {
                warn!(
                    batch = batch_no,
                    documents = cut,
                    max_chars = self.config.max_embed_chars,
                    "input truncated for embedding"
                );
            }
            let embeddings = self.embed_batch(&inputs).await?;
            debug!(batch = batch_no, size = batch.len(), "embedded batch");

            indexed.extend(batch.iter().zip(embeddings).map(|(doc, embedding)| {
                IndexedDocument {
                    metadata: doc.metadata.clone(),
                    text: doc.text.clone(),
                    embedding,
                }
            }));
        }

        let index = IndexFile {
            model: self.config.embedding_model.clone(),
            documents: indexed,
        };
        write_index(&self.config.index_path, &index).await?;

        info!(documents = index.documents.len(), path = %self.config.index_path.display(), "index updated");
        Ok(())
    }
}

/// The longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
