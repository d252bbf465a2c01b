//! Chat transcript model: messages, roles, and content blocks.
//!
//! Invariants maintained by the reconciliation engine:
//! - at most one message per in-flight turn has `is_streaming = true`, and
//!   it is always the most recently appended;
//! - `optimistic = true` marks a client-synthesized message not yet
//!   confirmed by the authoritative store; it is replaced, not flagged,
//!   once a matching authoritative message arrives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag families the agent runtime reserves for itself. A content block
/// consisting entirely of these is never shown to the user.
pub const RESERVED_TAGS: [&str; 5] = [
    "command-name",
    "command-message",
    "command-args",
    "local-command-stdout",
    "system-reminder",
];

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human (or client-synthesized) input.
    User,
    /// Agent output.
    Assistant,
}

/// One block of message content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text itself.
        text: String,
    },
    /// A tool invocation by the assistant.
    ToolUse {
        /// Invocation id, matched against tool results.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        input: Value,
        /// Matched result payload, attached by the enrichment pass.
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    /// A standalone tool result. Folded into its invocation and dropped
    /// by the enrichment pass.
    ToolResult {
        /// The invocation this result answers.
        tool_use_id: String,
        /// Result payload.
        content: Value,
    },
}

impl ContentBlock {
    /// Plain text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Whether this block is entirely system-reserved markup.
    pub fn is_system_markup(&self) -> bool {
        match self {
            Self::Text { text } => is_reserved_markup(text),
            Self::ToolUse { .. } | Self::ToolResult { .. } => false,
        }
    }
}

/// True when `text` consists solely of reserved tag sections (one or more,
/// possibly whitespace-separated).
fn is_reserved_markup(text: &str) -> bool {
    let mut rest = text.trim();
    if rest.is_empty() {
        return false;
    }
    'sections: while !rest.is_empty() {
        for tag in RESERVED_TAGS {
            let open = format!("<{tag}>");
            let close = format!("</{tag}>");
            if let Some(after_open) = rest.strip_prefix(open.as_str()) {
                if let Some(end) = after_open.find(close.as_str()) {
                    rest = after_open[end + close.len()..].trim_start();
                    continue 'sections;
                }
            }
        }
        return false;
    }
    true
}

/// One message in a session transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message id. Authoritative ids are assigned by the store; optimistic
    /// messages carry a client-generated id until replaced.
    pub id: String,
    /// Author.
    pub role: Role,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
    /// Creation time; the transcript is ordered by this, ascending.
    pub timestamp: DateTime<Utc>,
    /// Still receiving incremental content from an in-progress turn.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
    /// Client-synthesized, not yet confirmed by the store.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optimistic: bool,
    /// Image payloads lifted out of referenced tool results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Value>,
}

impl ChatMessage {
    /// A persisted user message.
    pub fn user(id: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: vec![ContentBlock::text(text)],
            timestamp,
            is_streaming: false,
            optimistic: false,
            images: Vec::new(),
        }
    }

    /// A client-synthesized echo of submitted text, shown before the store
    /// confirms it.
    pub fn optimistic_user(
        id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            optimistic: true,
            ..Self::user(id, text, timestamp)
        }
    }

    /// A streaming assistant message holding cumulative partial content.
    pub fn streaming_assistant(
        id: impl Into<String>,
        content: Vec<ContentBlock>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content,
            timestamp,
            is_streaming: true,
            optimistic: false,
            images: Vec::new(),
        }
    }

    /// Concatenated text of all text blocks.
    pub fn visible_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Structural equality of the content-block sequence — the match key
    /// for optimistic/authoritative reconciliation.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}
