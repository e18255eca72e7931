//! Per-conversation reply session types.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Lifecycle state of a conversation's auto-reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyState {
    /// No auto-reply.
    #[default]
    Idle,
    /// An admin asked to set the reply text; the next admin message is captured.
    AwaitingText,
    /// Every ordinary message gets `reply_text` back.
    Active,
}

impl fmt::Display for ReplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyState::Idle => write!(f, "idle"),
            ReplyState::AwaitingText => write!(f, "awaiting_text"),
            ReplyState::Active => write!(f, "active"),
        }
    }
}

/// Auto-reply session of one conversation.
///
/// While `AwaitingText`, `reply_text` still holds the previous text (if the
/// conversation was `Active` before) so other senders keep getting it until
/// the capture completes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplySession {
    pub state: ReplyState,
    pub reply_text: Option<String>,
}

impl ReplySession {
    /// The text to auto-reply with right now, if any.
    pub fn effective_reply(&self) -> Option<&str> {
        match self.state {
            ReplyState::Idle => None,
            ReplyState::AwaitingText | ReplyState::Active => self.reply_text.as_deref(),
        }
    }
}

/// Result of `start_reply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    AwaitingText,
}

/// Result of `end_reply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOutcome {
    /// An auto-reply text was set and has been cleared.
    Ended,
    /// There was nothing to end.
    NotActive,
}
