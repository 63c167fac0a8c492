//! Case message and reaction models.

use serde::{Deserialize, Serialize};

/// One entry in a case discussion thread. Messages are append-only; there is
/// no editing or deletion surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseMessage {
    /// Opaque UUID
    pub id: String,
    pub case_id: String,
    pub author_id: String,
    pub content: String,
    /// Case-wide read flag: one participant's view marks the message read
    /// for everyone. Not a per-viewer receipt.
    pub is_read: bool,
    /// Creation timestamp; also the thread ordering key
    pub created_at: String,
}

impl CaseMessage {
    /// Create a new unread message.
    pub fn new(case_id: String, author_id: String, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            case_id,
            author_id,
            content,
            is_read: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Closed set of supported reactions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    ThumbsUp,
    ThumbsDown,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 2] = [ReactionKind::ThumbsUp, ReactionKind::ThumbsDown];

    /// The stored (and displayed) form is the emoji itself.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::ThumbsUp => "👍",
            ReactionKind::ThumbsDown => "👎",
        }
    }

    pub fn parse(s: &str) -> Option<ReactionKind> {
        match s {
            "👍" => Some(ReactionKind::ThumbsUp),
            "👎" => Some(ReactionKind::ThumbsDown),
            _ => None,
        }
    }
}

/// One reaction row; unique per (message, user, kind).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageReaction {
    /// Opaque UUID
    pub id: String,
    pub message_id: String,
    pub user_id: String,
    pub kind: ReactionKind,
    /// Creation timestamp
    pub created_at: String,
}

impl MessageReaction {
    pub fn new(message_id: String, user_id: String, kind: ReactionKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_id,
            user_id,
            kind,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// What a reaction toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionToggle {
    Added,
    Removed,
}

impl ReactionToggle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionToggle::Added => "added",
            ReactionToggle::Removed => "removed",
        }
    }
}

/// Reactor display names for one kind, oldest reaction first.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionGroup {
    pub kind: ReactionKind,
    pub reactors: Vec<String>,
}

/// Per-message reaction chips plus the viewer's own choices.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionSummary {
    pub message_id: String,
    /// Only kinds that have at least one reactor
    pub groups: Vec<ReactionGroup>,
    pub viewer_kinds: Vec<ReactionKind>,
}
