//! On-disk retrieval index: the embedded corpus as one JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use postfeed_shared::{PostId, PostfeedError, Result};

/// The persisted retrieval index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFile {
    /// Embedding model that produced the vectors.
    pub model: String,
    /// One entry per corpus document, in corpus order.
    pub documents: Vec<IndexedDocument>,
}

/// A corpus document with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub metadata: PostId,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Read an index previously written by the NLP service.
pub async fn read_index(path: &Path) -> Result<IndexFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PostfeedError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| PostfeedError::parse(format!("invalid index {}: {e}", path.display())))
}

/// Replace the index at `path`: write a sibling temp file, then rename over.
pub(crate) async fn write_index(path: &Path, index: &IndexFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PostfeedError::io(parent, e))?;
    }

    let json = serde_json::to_vec(index)
        .map_err(|e| PostfeedError::Nlp(format!("failed to serialize index: {e}")))?;

    let temp = temp_path(path);
    tokio::fs::write(&temp, &json)
        .await
        .map_err(|e| PostfeedError::io(&temp, e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| PostfeedError::io(path, e))?;

    debug!(path = %path.display(), documents = index.documents.len(), bytes = json.len(), "wrote index");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".into());
    path.with_file_name(format!(".{name}.tmp"))
}
