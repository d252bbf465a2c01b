//! Local caches for reconciled state.
//!
//! One cache per active entity: a session's message list, or the set of
//! open workflow-run detail views. Nothing here is persisted — caches are
//! rebuilt from a snapshot fetch on reconnect. Mutation happens on a
//! single logical thread per entity.

use std::collections::{HashMap, HashSet};

use beacon_core::message::{ChatMessage, ContentBlock};
use beacon_core::run::RunDetail;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::enrich::enrich_messages;
use crate::merge::merge_messages;
use crate::run::{RunUpdate, apply_run_update};
use crate::stream::{apply_stream_chunk, finalize_streaming};

/// A client-local id for an optimistic message, replaced by the store's
/// own id once the message is confirmed.
fn next_local_id() -> String {
    format!("local-{}", Uuid::now_v7())
}

/// Reconciled view of one chat session.
#[derive(Debug, Default)]
pub struct SessionCache {
    messages: Vec<ChatMessage>,
    ids: HashSet<String>,
    loaded: bool,
}

impl SessionCache {
    /// Empty cache; populated by the first snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an authoritative snapshot.
    ///
    /// The snapshot fully replaces cached content only at initial load.
    /// Afterwards it is merged against in-flight optimistic/streaming
    /// state — blind replacement would lose it.
    pub fn sync_snapshot(&mut self, authoritative: Vec<ChatMessage>) {
        let authoritative = enrich_messages(authoritative);
        if self.loaded {
            let merged = merge_messages(std::mem::take(&mut self.messages), authoritative);
            self.messages = merged.messages;
            self.ids = merged.ids;
        } else {
            self.ids = authoritative.iter().map(|m| m.id.clone()).collect();
            self.messages = authoritative;
            self.loaded = true;
        }
        debug!(count = self.messages.len(), "snapshot applied");
    }

    /// Append an optimistic echo of submitted text; returns its local id.
    pub fn push_optimistic(&mut self, text: impl Into<String>) -> String {
        let id = next_local_id();
        let message = ChatMessage::optimistic_user(id.clone(), text, Utc::now());
        let _ = self.ids.insert(id.clone());
        self.messages.push(message);
        id
    }

    /// Apply one streaming content update.
    pub fn apply_chunk(&mut self, message_id: &str, content: Vec<ContentBlock>) {
        apply_stream_chunk(&mut self.messages, message_id, content);
        let _ = self.ids.insert(message_id.to_owned());
    }

    /// Finalize the in-flight turn (flip streaming flags, enrich).
    pub fn finalize_turn(&mut self) {
        let messages = std::mem::take(&mut self.messages);
        self.messages = finalize_streaming(messages);
        self.ids = self.messages.iter().map(|m| m.id.clone()).collect();
    }

    /// The reconciled, display-ready message list.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// O(1) duplicate check for incoming events.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Whether the initial snapshot has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Cached detail views of open workflow runs, keyed by run id.
#[derive(Debug, Default)]
pub struct RunCache {
    runs: HashMap<String, RunDetail>,
}

impl RunCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a fetched run detail (detail view opened).
    pub fn insert(&mut self, run: RunDetail) {
        let _ = self.runs.insert(run.id.clone(), run);
    }

    /// Drop a cached run (detail view closed).
    pub fn remove(&mut self, run_id: &str) {
        let _ = self.runs.remove(run_id);
    }

    /// The cached detail for a run, if the view is open.
    pub fn get(&self, run_id: &str) -> Option<&RunDetail> {
        self.runs.get(run_id)
    }

    /// Apply an incremental update to the targeted run.
    ///
    /// Returns `false` without doing anything when the run is not cached:
    /// the next explicit fetch picks the change up, and list views refresh
    /// via invalidation rather than incremental patching.
    pub fn apply(&mut self, update: &RunUpdate) -> bool {
        match self.runs.get_mut(update.run_id()) {
            Some(run) => {
                apply_run_update(run, update);
                true
            }
            None => {
                debug!(run_id = update.run_id(), "update for uncached run, ignoring");
                false
            }
        }
    }

    /// Number of cached runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no runs are cached.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
