//! Inbound events, control requests and outbound effects.
//!
//! These are the only shapes exchanged with the messaging transport. The
//! transport resolves its identities to a `Requester` before handing events
//! over and executes the `Effect`s it gets back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::admin::Requester;
use crate::message::{ConversationId, NewMessage};

/// A message received in some conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub sender: Requester,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    pub conversation_id: ConversationId,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    /// Transport's own opinion on whether the author is an admin. Advisory.
    #[serde(default)]
    pub is_admin_author: bool,
    /// The body is a bot command (e.g. `/stats`), not a conversational message.
    #[serde(default)]
    pub is_command_invocation: bool,
}

impl MessageEvent {
    /// The ledger entry for this event.
    ///
    /// Falls back to the sender's handle when no display name was given.
    pub fn to_new_message(&self) -> NewMessage {
        NewMessage {
            sender_id: self.sender.id,
            sender_display_name: self
                .sender_display_name
                .clone()
                .or_else(|| self.sender.handle.clone()),
            conversation_id: self.conversation_id,
            body: self.body.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Kinds of control requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Start,
    Help,
    StartReply,
    EndReply,
    AddAdmin,
    RemoveAdmin,
    ListAdmins,
    CreateBackup,
    RestoreBackup,
    ComputeStats,
    ListMessages,
}

impl ControlKind {
    /// Command name as typed in a conversation, without the slash.
    pub fn command_name(&self) -> &'static str {
        match self {
            ControlKind::Start => "start",
            ControlKind::Help => "help",
            ControlKind::StartReply => "reply",
            ControlKind::EndReply => "endreply",
            ControlKind::AddAdmin => "add_admin",
            ControlKind::RemoveAdmin => "remove_admin",
            ControlKind::ListAdmins => "list_admins",
            ControlKind::CreateBackup => "backup",
            ControlKind::RestoreBackup => "restore",
            ControlKind::ComputeStats => "stats",
            ControlKind::ListMessages => "show_data",
        }
    }

    pub fn from_command_name(name: &str) -> Option<Self> {
        let kind = match name {
            "start" => ControlKind::Start,
            "help" => ControlKind::Help,
            "reply" => ControlKind::StartReply,
            "endreply" => ControlKind::EndReply,
            "add_admin" => ControlKind::AddAdmin,
            "remove_admin" => ControlKind::RemoveAdmin,
            "list_admins" => ControlKind::ListAdmins,
            "backup" => ControlKind::CreateBackup,
            "restore" => ControlKind::RestoreBackup,
            "stats" => ControlKind::ComputeStats,
            "show_data" => ControlKind::ListMessages,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.command_name())
    }
}

/// A named text document, inbound (restore upload) or outbound (backup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub content: String,
}

/// A privileged (or informational) request aimed at a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub kind: ControlKind,
    pub requester: Requester,
    /// Conversation the request was issued in; replies go there.
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Document>,
}

/// Something the transport should do on our behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    SendText {
        conversation_id: ConversationId,
        text: String,
    },
    SendDocument {
        conversation_id: ConversationId,
        document: Document,
        caption: String,
    },
}

impl Effect {
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Effect::SendText { conversation_id, .. }
            | Effect::SendDocument { conversation_id, .. } => *conversation_id,
        }
    }
}

/// One line of the line-delimited JSON transport protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Inbound {
    Message(MessageEvent),
    Control(ControlRequest),
}
