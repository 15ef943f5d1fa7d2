//! Run-scoped set of already-processed post identifiers.

use std::collections::HashSet;

use postfeed_shared::PostId;

/// Identifiers whose summaries already exist in the store.
///
/// Built once at the start of a run from the store's listing and never
/// mutated afterwards; the next run builds a fresh one.
#[derive(Debug, Clone, Default)]
pub struct KnownIds {
    ids: HashSet<PostId>,
}

impl KnownIds {
    /// Build the set from the store's full identifier listing.
    pub fn membership(ids: impl IntoIterator<Item = PostId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
