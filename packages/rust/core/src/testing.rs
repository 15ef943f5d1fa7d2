//! Recording in-memory collaborators for orchestrator tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use postfeed_shared::{
    ContentSource, Document, FeedItem, NlpService, PostArchive, PostId, PostStore, PostfeedError,
    Result, Summary,
};

/// Collaborator operation, used for failure injection and call-order checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    GetItems,
    GetText,
    Summarize,
    Index,
    ListIds,
    StoreSummary,
    StoreText,
    GetDocuments,
    StoreDocuments,
    ListSummaries,
    LoadText,
}

/// A recorded call with its payload.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    GetItems(String),
    GetText(String),
    Summarize(String),
    Index(Vec<Document>),
    ListIds,
    StoreSummary(Summary),
    StoreText(PostId, String),
    GetDocuments,
    StoreDocuments(Vec<Document>),
    ListSummaries,
    LoadText(PostId),
}

impl Call {
    fn op(&self) -> Op {
        match self {
            Self::GetItems(_) => Op::GetItems,
            Self::GetText(_) => Op::GetText,
            Self::Summarize(_) => Op::Summarize,
            Self::Index(_) => Op::Index,
            Self::ListIds => Op::ListIds,
            Self::StoreSummary(_) => Op::StoreSummary,
            Self::StoreText(..) => Op::StoreText,
            Self::GetDocuments => Op::GetDocuments,
            Self::StoreDocuments(_) => Op::StoreDocuments,
            Self::ListSummaries => Op::ListSummaries,
            Self::LoadText(_) => Op::LoadText,
        }
    }
}

/// Persisted state of the fake store, plus the call log.
#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub calls: Vec<Call>,
    pub failures: usize,
    pub summaries: Vec<Summary>,
    pub texts: HashMap<PostId, String>,
    pub documents: Vec<Document>,
}

/// One object playing content source, NLP service, and store.
pub(crate) struct Fake {
    pub items: Vec<FeedItem>,
    pub text: String,
    pub summary: String,
    pub fail_on: Option<Op>,
    /// How many times `fail_on` fails before succeeding. `None` fails forever.
    pub fail_limit: Option<usize>,
    pub state: Mutex<FakeState>,
}

impl Fake {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self {
            items,
            text: "body".into(),
            summary: "sum".into(),
            fail_on: None,
            fail_limit: None,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn failing_on(mut self, op: Op) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Fail the first call to `op` only.
    pub fn failing_once(mut self, op: Op) -> Self {
        self.fail_on = Some(op);
        self.fail_limit = Some(1);
        self
    }

    /// Seed a summary (and optionally its text) as if a previous run stored it.
    pub fn with_stored(self, id: &str, text: Option<&str>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.summaries.push(Summary {
                id: PostId::new(id),
                url: format!("http://x.com/{id}.html"),
                title: format!("Title {id}"),
                summary: format!("summary {id}"),
            });
            if let Some(text) = text {
                state.texts.insert(PostId::new(id), text.to_string());
            }
        }
        self
    }

    pub fn with_documents(self, documents: Vec<Document>) -> Self {
        self.state.lock().unwrap().documents = documents;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.calls().iter().map(Call::op).collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        let op = call.op();
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if self.fail_on == Some(op) && self.fail_limit.is_none_or(|n| state.failures < n) {
            state.failures += 1;
            return Err(PostfeedError::Storage(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

pub(crate) fn item(link: &str, title: &str) -> FeedItem {
    FeedItem {
        link: link.into(),
        title: title.into(),
    }
}

pub(crate) fn doc(id: &str, text: &str) -> Document {
    Document {
        metadata: PostId::new(id),
        text: text.into(),
    }
}

#[async_trait]
impl ContentSource for Fake {
    async fn get_items(&self, feed_url: &str) -> Result<Vec<FeedItem>> {
        self.record(Call::GetItems(feed_url.into()))?;
        Ok(self.items.clone())
    }

    async fn get_text(&self, link: &str) -> Result<String> {
        self.record(Call::GetText(link.into()))?;
        Ok(self.text.clone())
    }
}

#[async_trait]
impl NlpService for Fake {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.record(Call::Summarize(text.into()))?;
        Ok(self.summary.clone())
    }

    async fn index(&self, documents: &[Document]) -> Result<()> {
        self.record(Call::Index(documents.to_vec()))
    }
}

#[async_trait]
impl PostStore for Fake {
    async fn list_ids(&self) -> Result<Vec<PostId>> {
        self.record(Call::ListIds)?;
        let state = self.state.lock().unwrap();
        Ok(state.summaries.iter().map(|s| s.id.clone()).collect())
    }

    async fn store_summary(&self, summary: &Summary) -> Result<()> {
        self.record(Call::StoreSummary(summary.clone()))?;
        self.state.lock().unwrap().summaries.push(summary.clone());
        Ok(())
    }

    async fn store_text(&self, id: &PostId, text: &str) -> Result<()> {
        self.record(Call::StoreText(id.clone(), text.into()))?;
        self.state
            .lock()
            .unwrap()
            .texts
            .insert(id.clone(), text.into());
        Ok(())
    }

    async fn get_documents(&self) -> Result<Vec<Document>> {
        self.record(Call::GetDocuments)?;
        Ok(self.state.lock().unwrap().documents.clone())
    }

    async fn store_documents(&self, documents: &[Document]) -> Result<()> {
        self.record(Call::StoreDocuments(documents.to_vec()))?;
        self.state.lock().unwrap().documents = documents.to_vec();
        Ok(())
    }
}

#[async_trait]
impl PostArchive for Fake {
    async fn list_summaries(&self) -> Result<Vec<Summary>> {
        self.record(Call::ListSummaries)?;
        Ok(self.state.lock().unwrap().summaries.clone())
    }

    async fn load_text(&self, id: &PostId) -> Result<Option<String>> {
        self.record(Call::LoadText(id.clone()))?;
        Ok(self.state.lock().unwrap().texts.get(id).cloned())
    }
}
