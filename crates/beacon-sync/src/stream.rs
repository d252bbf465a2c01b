//! Streaming append/update and turn finalization.
//!
//! The producer always sends the *full cumulative content* for a message,
//! so applying a chunk is a wholesale content replacement, never a diff.
//! Updates for a given message id must arrive in order; the WebSocket
//! transport guarantees that per connection.

use beacon_core::message::{ChatMessage, ContentBlock, Role};
use chrono::Utc;
use tracing::trace;

use crate::enrich::enrich_messages;

/// Apply one incremental content update for the given logical message id.
///
/// If the last message in the list has the *same id*, is an assistant
/// message, and is still streaming, its content is replaced in place.
/// Otherwise a new streaming assistant message is appended. The id check
/// matters: a single turn can emit multiple distinct assistant messages in
/// sequence (one per tool invocation), and keying on "is the last message
/// streaming" alone would collapse them into one.
pub fn apply_stream_chunk(
    messages: &mut Vec<ChatMessage>,
    message_id: &str,
    content: Vec<ContentBlock>,
) {
    if let Some(last) = messages.last_mut() {
        if last.id == message_id && last.role == Role::Assistant && last.is_streaming {
            trace!(message_id, blocks = content.len(), "replacing streaming content");
            last.content = content;
            return;
        }
    }
    trace!(message_id, "starting new streaming message");
    messages.push(ChatMessage::streaming_assistant(
        message_id,
        content,
        Utc::now(),
    ));
}

/// Finalize the in-flight turn: mark every currently-streaming message as
/// complete, then re-run the enrichment pass over the full list.
///
/// Finalization and enrichment are coupled: nested tool-result data only
/// becomes available once the corresponding result message has arrived.
pub fn finalize_streaming(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut messages = messages;
    for msg in &mut messages {
        msg.is_streaming = false;
    }
    enrich_messages(messages)
}
