//! Three-way message merge.
//!
//! The optimistic echo and the authoritative copy of the same logical
//! message carry *different* identifiers — the store assigns its own id
//! once it durably records the turn — so reconciliation matches them by
//! structural content equality. Two genuinely different user messages
//! with identical content would collide; resolution is deterministic
//! ("first unmatched wins") and a known approximation, not an error.

use std::collections::HashSet;

use beacon_core::message::{ChatMessage, Role};
use tracing::debug;

/// Result of a merge: the unified list plus its id set for O(1)
/// duplicate checks on future incoming events.
#[derive(Clone, Debug)]
pub struct MergedMessages {
    /// Deduplicated union, sorted by timestamp ascending.
    pub messages: Vec<ChatMessage>,
    /// Ids of every message in `messages`.
    pub ids: HashSet<String>,
}

/// Merge the in-memory view of a transcript with a freshly fetched
/// authoritative snapshot.
///
/// 1. In-memory messages are partitioned into optimistic user messages,
///    streaming assistant messages, and the rest — the rest is superseded
///    by the snapshot and discarded.
/// 2. Each optimistic user message is matched against the unmatched
///    authoritative user messages by content equality; first match wins
///    and removes the authoritative entry from the unmatched pool. On a
///    match the authoritative entry is kept (its id wins); on no match
///    the optimistic entry survives verbatim — the store has not caught
///    up yet, which is expected right after submission.
/// 3. Remaining authoritative entries are included as-is.
/// 4. Streaming assistant messages are included as-is: a still-streaming
///    message is always fresher than any snapshot, and displaces a stale
///    completed copy the snapshot may carry under the same id.
/// 5. The union is sorted by timestamp ascending.
pub fn merge_messages(
    in_memory: Vec<ChatMessage>,
    authoritative: Vec<ChatMessage>,
) -> MergedMessages {
    let mut optimistic_user = Vec::new();
    let mut streaming_assistant = Vec::new();
    for msg in in_memory {
        if msg.optimistic && msg.role == Role::User {
            optimistic_user.push(msg);
        } else if msg.is_streaming {
            streaming_assistant.push(msg);
        }
    }

    // Slots so a matched authoritative entry leaves the unmatched pool.
    let mut unmatched: Vec<Option<ChatMessage>> = authoritative.into_iter().map(Some).collect();
    let mut merged = Vec::with_capacity(unmatched.len() + streaming_assistant.len());

    for optimistic in optimistic_user {
        let slot = unmatched.iter_mut().find(|slot| {
            slot.as_ref()
                .is_some_and(|auth| auth.role == Role::User && auth.content == optimistic.content)
        });
        if let Some(mut auth) = slot.and_then(Option::take) {
            debug!(
                optimistic_id = %optimistic.id,
                authoritative_id = %auth.id,
                "optimistic message confirmed by store"
            );
            auth.optimistic = false;
            merged.push(auth);
        } else {
            merged.push(optimistic);
        }
    }

    // A still-streaming message is fresher than any snapshot: where the
    // snapshot already holds a completed counterpart under the same id,
    // the streaming copy wins.
    let streaming_ids: HashSet<&str> = streaming_assistant.iter().map(|m| m.id.as_str()).collect();
    merged.extend(
        unmatched
            .into_iter()
            .flatten()
            .filter(|auth| !streaming_ids.contains(auth.id.as_str())),
    );
    merged.extend(streaming_assistant);

    // Stable sort: equal timestamps keep arrival order.
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let ids = merged.iter().map(|m| m.id.clone()).collect();
    MergedMessages {
        messages: merged,
        ids,
    }
}
