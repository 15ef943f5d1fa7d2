//! Incremental update flow for the post corpus.
//!
//! Enumerates the feed, skips excluded and already-known posts, and runs the
//! new-item pipeline (fetch, summarize, store, extend corpus, reindex) for
//! everything else. The first failing step ends the run; re-running later is
//! safe because known posts are skipped and corpus extension is guarded.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};

use postfeed_shared::{AppConfig, ContentSource, FeedItem, NlpService, PostId, PostStore, Summary};

use crate::corpus;
use crate::error::UpdateError;
use crate::identity::identifier_of;
use crate::known_ids::KnownIds;

// ---------------------------------------------------------------------------
// Update config & result
// ---------------------------------------------------------------------------

/// Configuration for one update run.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Address of the author's feed.
    pub feed_url: String,
    /// Links containing any of these substrings are skipped unconditionally.
    pub exclude_patterns: Vec<String>,
}

impl From<&AppConfig> for UpdateConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            feed_url: config.feed.url.clone(),
            exclude_patterns: config.feed.exclude_patterns.clone(),
        }
    }
}

/// Counts from a successful run.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Items listed by the feed.
    pub items_seen: usize,
    /// Items skipped by the exclusion patterns.
    pub items_excluded: usize,
    /// Items skipped because their summary already exists.
    pub items_known: usize,
    /// Identifiers that went through the full pipeline, in feed order.
    pub processed: Vec<PostId>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// The three collaborators a run drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub source: &'a dyn ContentSource,
    pub nlp: &'a dyn NlpService,
    pub store: &'a dyn PostStore,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait UpdateProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a new post has gone through the whole pipeline.
    fn item_processed(&self, id: &PostId, title: &str, current: usize, total: usize);
    /// Called when the run completes successfully.
    fn done(&self, report: &UpdateReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl UpdateProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_processed(&self, _id: &PostId, _title: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &UpdateReport) {}
}

// ---------------------------------------------------------------------------
// Exclusion
// ---------------------------------------------------------------------------

/// Whether `link` matches any permanently excluded pattern.
pub fn is_excluded(link: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|p| !p.is_empty() && link.contains(p.as_str()))
}

// ---------------------------------------------------------------------------
// Update run
// ---------------------------------------------------------------------------

/// Run one update.
///
/// 1. List feed items
/// 2. Build the known-ID set from the store
/// 3. For each item in feed order: skip excluded, skip known, otherwise run
///    the new-item pipeline and abort on its first error
#[instrument(skip_all, fields(feed = %config.feed_url))]
pub async fn run_update(
    config: &UpdateConfig,
    collab: Collaborators<'_>,
    progress: &dyn UpdateProgress,
) -> Result<UpdateReport, UpdateError> {
    let start = Instant::now();

    progress.phase("Fetching feed");
    let items = collab
        .source
        .get_items(&config.feed_url)
        .await
        .map_err(|e| failed(UpdateError::Fetch(e)))?;

    progress.phase("Loading known posts");
    let known = KnownIds::membership(
        collab
            .store
            .list_ids()
            .await
            .map_err(|e| failed(UpdateError::StoreRead(e)))?,
    );

    info!(items = items.len(), known = known.len(), "starting update run");

    let mut report = UpdateReport {
        items_seen: items.len(),
        ..Default::default()
    };

    progress.phase("Processing new posts");
    for item in &items {
        if is_excluded(&item.link, &config.exclude_patterns) {
            debug!(link = %item.link, "excluded, skipping");
            report.items_excluded += 1;
            continue;
        }

        let id = identifier_of(&item.link);
        if known.contains(&id) {
            debug!(%id, "already known, skipping");
            report.items_known += 1;
            continue;
        }

        process_new_item(item, &id, collab).await?;

        progress.item_processed(&id, &item.title, report.processed.len() + 1, items.len());
        report.processed.push(id);
    }

    report.elapsed = start.elapsed();
    progress.done(&report);

    info!(
        seen = report.items_seen,
        excluded = report.items_excluded,
        known = report.items_known,
        processed = report.processed.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "update complete"
    );

    Ok(report)
}

/// The new-item pipeline. Each step only runs if the previous one succeeded.
///
/// The summary is stored before anything else is written, so its presence
/// always means the post was at least partially processed.
#[instrument(skip_all, fields(%id))]
async fn process_new_item(
    item: &FeedItem,
    id: &PostId,
    collab: Collaborators<'_>,
) -> Result<(), UpdateError> {
    info!(link = %item.link, title = %item.title, "processing new post");

    let text = collab
        .source
        .get_text(&item.link)
        .await
        .map_err(|source| {
            failed(UpdateError::ContentFetch {
                link: item.link.clone(),
                source,
            })
        })?;

    let summary = collab.nlp.summarize(&text).await.map_err(|source| {
        failed(UpdateError::Summarization {
            id: id.to_string(),
            source,
        })
    })?;

    collab
        .store
        .store_summary(&Summary {
            id: id.clone(),
            url: item.link.clone(),
            title: item.title.clone(),
            summary,
        })
        .await
        .map_err(|source| {
            failed(UpdateError::PersistSummary {
                id: id.to_string(),
                source,
            })
        })?;

    collab.store.store_text(id, &text).await.map_err(|source| {
        failed(UpdateError::PersistText {
            id: id.to_string(),
            source,
        })
    })?;

    // Re-read rather than reuse anything from earlier in the run.
    let documents = collab
        .store
        .get_documents()
        .await
        .map_err(|e| failed(UpdateError::StoreRead(e)))?;
    let before = documents.len();
    let documents = corpus::extend(documents, id, corpus::document_text(&item.title, &text));

    collab
        .nlp
        .index(&documents)
        .await
        .map_err(|e| failed(UpdateError::IndexUpdate(e)))?;

    collab
        .store
        .store_documents(&documents)
        .await
        .map_err(|e| failed(UpdateError::PersistCorpus(e)))?;

    debug!(before, after = documents.len(), "corpus updated");
    Ok(())
}

/// Log the failing step before the error propagates.
pub(crate) fn failed(err: UpdateError) -> UpdateError {
    error!(kind = err.kind(), error = %err.collaborator_error(), "{err}");
    err
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, Fake, Op, doc, item};

    fn config() -> UpdateConfig {
        UpdateConfig {
            feed_url: "rss_url".into(),
            exclude_patterns: vec!["1638975042".into()],
        }
    }

    fn collab(fake: &Fake) -> Collaborators<'_> {
        Collaborators {
            source: fake,
            nlp: fake,
            store: fake,
        }
    }

    async fn run(fake: &Fake) -> Result<UpdateReport, UpdateError> {
        run_update(&config(), collab(fake), &SilentProgress).await
    }

    #[tokio::test]
    async fn new_item_runs_full_pipeline() {
        let fake = Fake::new(vec![item("http://x.com/abc123.html", "T")]);

        let report = run(&fake).await.expect("run succeeds");

        assert_eq!(report.processed, vec![PostId::new("abc123")]);
        let grown = vec![doc("abc123", "T body")];
        assert_eq!(
            fake.calls(),
            vec![
                Call::GetItems("rss_url".into()),
                Call::ListIds,
                Call::GetText("http://x.com/abc123.html".into()),
                Call::Summarize("body".into()),
                Call::StoreSummary(Summary {
                    id: PostId::new("abc123"),
                    url: "http://x.com/abc123.html".into(),
                    title: "T".into(),
                    summary: "sum".into(),
                }),
                Call::StoreText(PostId::new("abc123"), "body".into()),
                Call::GetDocuments,
                Call::Index(grown.clone()),
                Call::StoreDocuments(grown),
            ]
        );
    }

    #[tokio::test]
    async fn known_item_only_lists() {
        let fake = Fake::new(vec![item("http://x.com/abc123.html", "T")])
            .with_stored("abc123", Some("old body"));

        let report = run(&fake).await.expect("run succeeds");

        assert!(report.processed.is_empty());
        assert_eq!(report.items_known, 1);
        assert_eq!(fake.ops(), vec![Op::GetItems, Op::ListIds]);
    }

    #[tokio::test]
    async fn excluded_link_is_never_processed() {
        let fake = Fake::new(vec![
            item("http://x.com/1638975042-chapter1.html", "Lisp"),
            item("http://x.com/new.html", "New"),
        ]);

        let report = run(&fake).await.expect("run succeeds");

        assert_eq!(report.items_excluded, 1);
        assert_eq!(report.processed, vec![PostId::new("new")]);
        assert!(
            !fake
                .calls()
                .contains(&Call::GetText("http://x.com/1638975042-chapter1.html".into()))
        );
    }

    #[tokio::test]
    async fn exclusion_applies_before_dedup() {
        // Excluded even though the id is unknown, and counted as excluded
        // rather than known even when the id is stored.
        let fake = Fake::new(vec![item("http://x.com/1638975042.html", "Lisp")])
            .with_stored("1638975042", None);

        let report = run(&fake).await.expect("run succeeds");
        assert_eq!(report.items_excluded, 1);
        assert_eq!(report.items_known, 0);
    }

    #[tokio::test]
    async fn grows_existing_corpus_by_one() {
        let fake = Fake::new(vec![item("http://x.com/new_id.html", "New")])
            .with_stored("mock_id", Some("mock text"))
            .with_documents(vec![doc("mock_id", "mock text")]);

        run(&fake).await.expect("run succeeds");

        let state = fake.state.lock().unwrap();
        assert_eq!(
            state.documents,
            vec![doc("mock_id", "mock text"), doc("new_id", "New body")]
        );
        let index_calls: Vec<_> = state
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Index(_)))
            .collect();
        assert_eq!(index_calls.len(), 1);
        assert_eq!(state.summaries.len(), 2);
        assert_eq!(state.texts.len(), 2);
    }

    #[tokio::test]
    async fn processes_only_unknown_items_in_feed_order() {
        let fake = Fake::new(vec![
            item("http://x.com/a.html", "A"),
            item("http://x.com/b.html", "B"),
            item("http://x.com/c.html", "C"),
        ])
        .with_stored("b", None);

        let report = run(&fake).await.expect("run succeeds");

        assert_eq!(report.items_seen, 3);
        assert_eq!(report.items_known, 1);
        assert_eq!(report.processed, vec![PostId::new("a"), PostId::new("c")]);
        assert_eq!(
            fake.state.lock().unwrap().documents,
            vec![doc("a", "A body"), doc("c", "C body")]
        );
    }

    #[tokio::test]
    async fn corpus_entry_is_not_duplicated_when_already_present() {
        // Summary missing but document present, e.g. after manual cleanup.
        let fake = Fake::new(vec![item("http://x.com/abc.html", "T")])
            .with_documents(vec![doc("abc", "T old")]);

        run(&fake).await.expect("run succeeds");

        assert_eq!(fake.state.lock().unwrap().documents, vec![doc("abc", "T old")]);
    }

    #[tokio::test]
    async fn empty_feed_succeeds() {
        let fake = Fake::new(vec![]);
        let report = run(&fake).await.expect("run succeeds");
        assert_eq!(report.items_seen, 0);
        assert_eq!(fake.ops(), vec![Op::GetItems, Op::ListIds]);
    }

    #[tokio::test]
    async fn feed_failure_stops_before_listing() {
        let fake = Fake::new(vec![item("http://x.com/a.html", "A")]).failing_on(Op::GetItems);

        let err = run(&fake).await.unwrap_err();

        assert_eq!(err.kind(), "FetchError");
        assert_eq!(fake.ops(), vec![Op::GetItems]);
    }

    #[tokio::test]
    async fn listing_failure_is_store_read_error() {
        let fake = Fake::new(vec![item("http://x.com/a.html", "A")]).failing_on(Op::ListIds);

        let err = run(&fake).await.unwrap_err();

        assert_eq!(err.kind(), "StoreReadError");
        assert_eq!(fake.ops(), vec![Op::GetItems, Op::ListIds]);
    }

    /// Every pipeline step: the run returns that step's error and nothing
    /// after it executes.
    #[tokio::test]
    async fn each_pipeline_step_fails_fast() {
        let pipeline = [
            (Op::GetText, "ContentFetchError"),
            (Op::Summarize, "SummarizationError"),
            (Op::StoreSummary, "PersistSummaryError"),
            (Op::StoreText, "PersistTextError"),
            (Op::GetDocuments, "StoreReadError"),
            (Op::Index, "IndexUpdateError"),
            (Op::StoreDocuments, "PersistCorpusError"),
        ];

        for (position, (op, kind)) in pipeline.iter().enumerate() {
            let fake = Fake::new(vec![
                item("http://x.com/new_id.html", "New"),
                item("http://x.com/later.html", "Later"),
            ])
            .failing_on(*op);

            let err = run(&fake).await.unwrap_err();
            assert_eq!(err.kind(), *kind, "failing on {op:?}");

            let mut expected = vec![Op::GetItems, Op::ListIds];
            expected.extend(pipeline[..=position].iter().map(|(op, _)| *op));
            assert_eq!(fake.ops(), expected, "failing on {op:?}");
        }
    }

    #[tokio::test]
    async fn text_failure_stores_nothing() {
        let fake = Fake::new(vec![item("http://x.com/abc123.html", "T")]).failing_on(Op::GetText);

        let err = run(&fake).await.unwrap_err();

        assert!(matches!(err, UpdateError::ContentFetch { ref link, .. } if link == "http://x.com/abc123.html"));
        let state = fake.state.lock().unwrap();
        assert!(state.summaries.is_empty());
        assert!(state.texts.is_empty());
        assert!(state.documents.is_empty());
    }

    #[tokio::test]
    async fn failure_after_summary_leaves_post_known_on_next_run() {
        let link = "http://x.com/abc123.html";
        let fake = Fake::new(vec![item(link, "T")]).failing_on(Op::Index);
        run(&fake).await.unwrap_err();

        // Second run against the same state, collaborators healthy again.
        let retry = Fake::new(vec![item(link, "T")]);
        {
            let first = fake.state.lock().unwrap();
            let mut state = retry.state.lock().unwrap();
            state.summaries = first.summaries.clone();
            state.texts = first.texts.clone();
            state.documents = first.documents.clone();
        }

        let report = run(&retry).await.expect("second run succeeds");

        // Known via its summary, so the corpus extension is not retried.
        assert_eq!(report.items_known, 1);
        assert!(retry.state.lock().unwrap().documents.is_empty());
        assert_eq!(retry.ops(), vec![Op::GetItems, Op::ListIds]);
    }

    #[test]
    fn exclusion_matches_substrings_only() {
        let patterns = vec!["1638975042".to_string()];
        assert!(is_excluded("http://x.com/1638975042.html", &patterns));
        assert!(!is_excluded("http://x.com/essay.html", &patterns));
        assert!(!is_excluded("http://x.com/essay.html", &[]));
        assert!(!is_excluded("http://x.com/essay.html", &[String::new()]));
    }

    #[test]
    fn update_config_from_app_config() {
        let app = AppConfig::default();
        let config = UpdateConfig::from(&app);
        assert_eq!(config.feed_url, app.feed.url);
        assert_eq!(config.exclude_patterns, vec!["1638975042".to_string()]);
    }
}
