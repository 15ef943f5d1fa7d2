//! Corpus repair for posts whose summary exists but whose document was never
//! added, e.g. after a run that failed between storing the summary and
//! persisting the corpus.

use tracing::{info, instrument, warn};

use postfeed_shared::{NlpService, PostArchive};

use crate::corpus;
use crate::error::UpdateError;
use crate::update::failed;

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Documents appended to the corpus.
    pub documents_added: usize,
    /// Summaries with neither a corpus document nor stored text.
    pub missing_text: usize,
    /// Corpus size after the pass.
    pub corpus_len: usize,
}

/// Append a document for every stored summary absent from the corpus, using
/// the stored raw text. Reindexes and persists only when something was added.
#[instrument(skip_all)]
pub async fn repair_corpus(
    nlp: &dyn NlpService,
    archive: &dyn PostArchive,
) -> Result<RepairReport, UpdateError> {
    let summaries = archive
        .list_summaries()
        .await
        .map_err(|e| failed(UpdateError::StoreRead(e)))?;
    let mut documents = archive
        .get_documents()
        .await
        .map_err(|e| failed(UpdateError::StoreRead(e)))?;

    let mut report = RepairReport::default();

    for summary in &summaries {
        if corpus::contains(&documents, &summary.id) {
            continue;
        }
        let Some(text) = archive
            .load_text(&summary.id)
            .await
            .map_err(|e| failed(UpdateError::StoreRead(e)))?
        else {
            warn!(id = %summary.id, "summary has no stored text, cannot rebuild document");
            report.missing_text += 1;
            continue;
        };

        documents = corpus::extend(
            documents,
            &summary.id,
            corpus::document_text(&summary.title, &text),
        );
        report.documents_added += 1;
    }

    report.corpus_len = documents.len();

    if report.documents_added == 0 {
        info!(corpus = report.corpus_len, "corpus already complete");
        return Ok(report);
    }

    nlp.index(&documents)
        .await
        .map_err(|e| failed(UpdateError::IndexUpdate(e)))?;
    archive
        .store_documents(&documents)
        .await
        .map_err(|e| failed(UpdateError::PersistCorpus(e)))?;

    info!(
        added = report.documents_added,
        missing_text = report.missing_text,
        corpus = report.corpus_len,
        "corpus repaired"
    );
    Ok(report)
}
