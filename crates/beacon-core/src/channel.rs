//! Channel names — the `{resource}:{id}` pub/sub topics.
//!
//! A channel exists only as a registry key: it is created when the first
//! connection subscribes and destroyed when its subscriber set empties.
//! Nothing about a channel is persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SyncError;

/// The resource namespace of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// An agent chat session (`session:{id}`).
    Session,
    /// A project (`project:{id}`).
    Project,
    /// A terminal attached to a session (`terminal:{session_id}`).
    Terminal,
    /// A workflow run (`run:{id}`).
    Run,
}

impl ChannelKind {
    /// The wire prefix for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Project => "project",
            Self::Terminal => "terminal",
            Self::Run => "run",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed channel identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Channel {
    /// Resource namespace.
    pub kind: ChannelKind,
    /// Resource identifier within the namespace.
    pub id: String,
}

impl Channel {
    /// Build a channel from a kind and resource id.
    pub fn new(kind: ChannelKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Parse a `{resource}:{id}` string.
    ///
    /// The resource must be a known kind and the id must be non-empty.
    /// Unknown resources are a parse error here; the access validator turns
    /// that into a denial with a reason.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let Some((resource, id)) = raw.split_once(':') else {
            return Err(SyncError::MalformedRequest {
                reason: format!("channel '{raw}' is not of the form resource:id"),
            });
        };
        if id.is_empty() {
            return Err(SyncError::MalformedRequest {
                reason: format!("channel '{raw}' has an empty resource id"),
            });
        }
        let kind = match resource {
            "session" => ChannelKind::Session,
            "project" => ChannelKind::Project,
            "terminal" => ChannelKind::Terminal,
            "run" => ChannelKind::Run,
            other => {
                return Err(SyncError::AccessDenied {
                    channel: raw.to_owned(),
                    reason: format!("unknown resource type '{other}'"),
                });
            }
        };
        Ok(Self {
            kind,
            id: id.to_owned(),
        })
    }

    /// Session channel for the given id.
    pub fn session(id: impl AsRef<str>) -> Self {
        Self::new(ChannelKind::Session, id.as_ref())
    }

    /// Project channel for the given id.
    pub fn project(id: impl AsRef<str>) -> Self {
        Self::new(ChannelKind::Project, id.as_ref())
    }

    /// Terminal channel for the given session id.
    pub fn terminal(id: impl AsRef<str>) -> Self {
        Self::new(ChannelKind::Terminal, id.as_ref())
    }

    /// Workflow-run channel for the given id.
    pub fn run(id: impl AsRef<str>) -> Self {
        Self::new(ChannelKind::Run, id.as_ref())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_session_channel() {
        let ch = Channel::parse("session:sess_1").unwrap();
        assert_eq!(ch.kind, ChannelKind::Session);
        assert_eq!(ch.id, "sess_1");
    }

    #[test]
    fn parse_project_channel() {
        let ch = Channel::parse("project:proj_9").unwrap();
        assert_eq!(ch.kind, ChannelKind::Project);
        assert_eq!(ch.id, "proj_9");
    }

    #[test]
    fn parse_terminal_channel() {
        let ch = Channel::parse("terminal:sess_1").unwrap();
        assert_eq!(ch.kind, ChannelKind::Terminal);
    }

    #[test]
    fn parse_run_channel() {
        let ch = Channel::parse("run:run_42").unwrap();
        assert_eq!(ch.kind, ChannelKind::Run);
        assert_eq!(ch.id, "run_42");
    }

    #[test]
    fn parse_unknown_resource_is_denied() {
        let err = Channel::parse("widget:1").unwrap_err();
        assert!(matches!(err, SyncError::AccessDenied { .. }));
        assert!(err.to_string().contains("widget"));
    }

    #[test]
    fn parse_missing_separator() {
        let err = Channel::parse("session").unwrap_err();
        assert!(matches!(err, SyncError::MalformedRequest { .. }));
    }

    #[test]
    fn parse_empty_id() {
        let err = Channel::parse("session:").unwrap_err();
        assert!(matches!(err, SyncError::MalformedRequest { .. }));
    }

    #[test]
    fn id_may_contain_colons() {
        // Only the first colon splits; UUIDs never contain colons but ids
        // from other stores might.
        let ch = Channel::parse("run:a:b").unwrap();
        assert_eq!(ch.id, "a:b");
    }

    #[test]
    fn display_roundtrip() {
        let ch = Channel::session("sess_7");
        assert_eq!(ch.to_string(), "session:sess_7");
        let back = Channel::parse(&ch.to_string()).unwrap();
        assert_eq!(back, ch);
    }

    #[test]
    fn constructors() {
        assert_eq!(Channel::project("p").to_string(), "project:p");
        assert_eq!(Channel::terminal("t").to_string(), "terminal:t");
        assert_eq!(Channel::run("r").to_string(), "run:r");
    }

    #[test]
    fn kind_as_str() {
        assert_eq!(ChannelKind::Session.as_str(), "session");
        assert_eq!(ChannelKind::Project.as_str(), "project");
        assert_eq!(ChannelKind::Terminal.as_str(), "terminal");
        assert_eq!(ChannelKind::Run.as_str(), "run");
    }
}
