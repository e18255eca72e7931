//! Per-conversation reply sessions.
//!
//! Each conversation gets a `ReplySession` behind its own mutex, created on
//! first reference. Transitions for one conversation are serialized by that
//! mutex; unrelated conversations never contend.

use std::sync::Arc;

use dashmap::DashMap;
use ledgerbot_types::admin::Requester;
use ledgerbot_types::error::ReplyError;
use ledgerbot_types::event::MessageEvent;
use ledgerbot_types::message::ConversationId;
use ledgerbot_types::session::{EndOutcome, ReplySession, ReplyState, StartOutcome};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::admin::AdminRegistry;
use crate::repository::admin::AdminStore;

/// What to do with an inbound, non-command message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Consumed as the new reply text; not an ordinary message.
    Captured { reply_text: String },
    /// Append to the ledger, then auto-reply with `auto_reply` if set.
    Ordinary { auto_reply: Option<String> },
}

/// Reply-session state machine for all conversations.
pub struct ReplySessions<A: AdminStore> {
    admins: Arc<AdminRegistry<A>>,
    sessions: DashMap<ConversationId, Arc<Mutex<ReplySession>>>,
}

impl<A: AdminStore> ReplySessions<A> {
    pub fn new(admins: Arc<AdminRegistry<A>>) -> Self {
        Self {
            admins,
            sessions: DashMap::new(),
        }
    }

    fn slot(&self, conversation: ConversationId) -> Arc<Mutex<ReplySession>> {
        self.sessions.entry(conversation).or_default().clone()
    }

    /// Current session of a conversation; `Idle` if it was never referenced.
    pub async fn get(&self, conversation: ConversationId) -> ReplySession {
        let slot = self.sessions.get(&conversation).map(|s| s.value().clone());
        match slot {
            Some(slot) => slot.lock().await.clone(),
            None => ReplySession::default(),
        }
    }

    /// `Idle | Active -> AwaitingText`. Any stored reply text survives until
    /// the capture completes.
    pub async fn start_reply(
        &self,
        conversation: ConversationId,
        requester: &Requester,
    ) -> Result<StartOutcome, ReplyError> {
        let slot = self.slot(conversation);
        let mut session = slot.lock().await;

        if !self.admins.is_admin(requester).await {
            warn!(%conversation, requester = %requester.id, "unauthorized start_reply");
            return Err(ReplyError::Unauthorized);
        }

        session.state = ReplyState::AwaitingText;
        info!(%conversation, requester = %requester.id, "awaiting reply text");
        Ok(StartOutcome::AwaitingText)
    }

    /// `Active -> Idle`, clearing the reply text. `Idle` reports `NotActive`
    /// and changes nothing. A pending capture is cancelled.
    pub async fn end_reply(
        &self,
        conversation: ConversationId,
        requester: &Requester,
    ) -> Result<EndOutcome, ReplyError> {
        let slot = self.slot(conversation);
        let mut session = slot.lock().await;

        if !self.admins.is_admin(requester).await {
            warn!(%conversation, requester = %requester.id, "unauthorized end_reply");
            return Err(ReplyError::Unauthorized);
        }

        let outcome = match session.state {
            ReplyState::Idle => return Ok(EndOutcome::NotActive),
            ReplyState::Active => EndOutcome::Ended,
            ReplyState::AwaitingText if session.reply_text.is_some() => EndOutcome::Ended,
            ReplyState::AwaitingText => EndOutcome::NotActive,
        };
        *session = ReplySession::default();

        info!(%conversation, requester = %requester.id, ?outcome, "reply mode ended");
        Ok(outcome)
    }

    /// Route an inbound message through the state machine.
    ///
    /// While `AwaitingText`, a message from an admin becomes the reply text
    /// (`-> Active`). Anyone else's message stays ordinary and still gets the
    /// previous reply text, if there was one.
    pub async fn on_message(&self, event: &MessageEvent) -> Disposition {
        let conversation = event.conversation_id;
        let slot = self.slot(conversation);
        let mut session = slot.lock().await;

        if session.state == ReplyState::AwaitingText {
            let is_admin = self.admins.is_admin(&event.sender).await;
            if is_admin != event.is_admin_author {
                debug!(
                    %conversation,
                    sender_id = %event.sender.id,
                    registry = is_admin,
                    transport = event.is_admin_author,
                    "admin flag disagrees with registry"
                );
            }
            if is_admin {
                session.state = ReplyState::Active;
                session.reply_text = Some(event.body.clone());
                info!(%conversation, sender_id = %event.sender.id, "reply text captured");
                return Disposition::Captured {
                    reply_text: event.body.clone(),
                };
            }
        }

        Disposition::Ordinary {
            auto_reply: session.effective_reply().map(str::to_string),
        }
    }
}
