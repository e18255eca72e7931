//! Routes inbound events to the ledger, the reply sessions and the control
//! components, and turns their results into outbound effects.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::TryStreamExt;
use ledgerbot_types::admin::{AddOutcome, Principal};
use ledgerbot_types::backup::{DedupPolicy, RestoreResult};
use ledgerbot_types::config::LedgerConfig;
use ledgerbot_types::error::{BackupError, ControlError, LedgerError};
use ledgerbot_types::event::{ControlKind, ControlRequest, Document, Effect, Inbound, MessageEvent};
use ledgerbot_types::message::{ConversationId, MessageRecord};
use ledgerbot_types::session::EndOutcome;
use ledgerbot_types::stats::StatsReport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::admin::AdminRegistry;
use crate::backup::BackupManager;
use crate::control::command::request_from_event;
use crate::control::render;
use crate::control::sink::EffectSink;
use crate::ledger::Ledger;
use crate::repository::SortOrder;
use crate::repository::admin::AdminStore;
use crate::repository::ledger::MessageLedger;
use crate::session::{Disposition, ReplySessions};
use crate::stats::StatsAggregator;

/// Successful result of a control request.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlReply {
    Greeting,
    Help,
    ReplyStarted,
    ReplyEnded(EndOutcome),
    AdminAdded {
        principal: Principal,
        outcome: AddOutcome,
    },
    AdminRemoved {
        principal: Principal,
    },
    Admins(BTreeSet<Principal>),
    Backup {
        document: Document,
        record_count: usize,
    },
    Restored(RestoreResult),
    Stats(StatsReport),
    Messages(Vec<MessageRecord>),
}

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Command body naming no known command.
    Ignored,
    /// Routed to a control component; its reply (or error) was emitted.
    Command(ControlKind),
    /// Consumed as the conversation's new reply text.
    Captured { reply_text: String },
    /// Appended to the ledger.
    Recorded {
        record: MessageRecord,
        auto_reply: Option<String>,
        delivered: bool,
    },
}

/// Entry point for everything the transport hands over.
pub struct Dispatcher<L: MessageLedger, A: AdminStore, E: EffectSink> {
    ledger: Arc<Ledger<L>>,
    admins: Arc<AdminRegistry<A>>,
    sessions: ReplySessions<A>,
    backups: BackupManager<L, A>,
    stats: StatsAggregator<L>,
    sink: E,
    config: LedgerConfig,
    shutdown: CancellationToken,
}

impl<L: MessageLedger, A: AdminStore, E: EffectSink> Dispatcher<L, A, E> {
    pub fn new(
        ledger: Arc<Ledger<L>>,
        admins: Arc<AdminRegistry<A>>,
        sink: E,
        config: LedgerConfig,
    ) -> Self {
        Self {
            sessions: ReplySessions::new(admins.clone()),
            backups: BackupManager::new(
                ledger.clone(),
                admins.clone(),
                config.backup_include_admins,
                config.restore_admins,
            ),
            stats: StatsAggregator::new(ledger.clone(), config.top_senders),
            ledger,
            admins,
            sink,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger<L>> {
        &self.ledger
    }

    pub fn admins(&self) -> &Arc<AdminRegistry<A>> {
        &self.admins
    }

    pub fn sessions(&self) -> &ReplySessions<A> {
        &self.sessions
    }

    pub fn backups(&self) -> &BackupManager<L, A> {
        &self.backups
    }

    pub fn stats(&self) -> &StatsAggregator<L> {
        &self.stats
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Cancelling this token aborts in-flight restores that have not swapped yet.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Handle any inbound event. Control failures are reported to the
    /// conversation, so only ledger failures surface here.
    pub async fn handle_inbound(&self, inbound: Inbound) -> Result<(), LedgerError> {
        match inbound {
            Inbound::Message(event) => self.handle_message(event).await.map(|_| ()),
            Inbound::Control(request) => {
                let _ = self.handle_control(request).await;
                Ok(())
            }
        }
    }

    /// Handle one conversational message.
    ///
    /// The auto-reply is emitted only after the message is durably appended.
    /// A failed delivery is logged and never undoes the append.
    pub async fn handle_message(&self, event: MessageEvent) -> Result<MessageOutcome, LedgerError> {
        if event.is_command_invocation {
            return Ok(match request_from_event(&event) {
                Some(request) => {
                    let kind = request.kind;
                    let _ = self.handle_control(request).await;
                    MessageOutcome::Command(kind)
                }
                None => {
                    debug!(conversation = %event.conversation_id, body = %event.body, "unknown command ignored");
                    MessageOutcome::Ignored
                }
            });
        }

        match self.sessions.on_message(&event).await {
            Disposition::Captured { reply_text } => {
                self.emit(Effect::SendText {
                    conversation_id: event.conversation_id,
                    text: render::capture_confirmation(&reply_text),
                })
                .await;
                Ok(MessageOutcome::Captured { reply_text })
            }
            Disposition::Ordinary { auto_reply } => {
                let record = self.ledger.append(event.to_new_message()).await?;
                let delivered = match &auto_reply {
                    Some(text) => {
                        self.emit(Effect::SendText {
                            conversation_id: record.conversation_id,
                            text: text.clone(),
                        })
                        .await
                    }
                    None => false,
                };
                Ok(MessageOutcome::Recorded {
                    record,
                    auto_reply,
                    delivered,
                })
            }
        }
    }

    /// Execute a control request and emit its rendered reply or error.
    ///
    /// A message dump requested outside the requester's private chat is sent
    /// to that private chat; the issuing conversation only gets a notice.
    #[tracing::instrument(
        name = "control.handle",
        skip_all,
        fields(kind = %request.kind, conversation = %request.conversation_id, requester = %request.requester.id)
    )]
    pub async fn handle_control(&self, request: ControlRequest) -> Result<ControlReply, ControlError> {
        let conversation = request.conversation_id;
        let kind = request.kind;
        let requester = request.requester.id;

        match self.execute(request).await {
            Ok(reply) => {
                info!(%kind, %requester, %conversation, "control request handled");
                let effects = match &reply {
                    ControlReply::Messages(_) if conversation.0 != requester.0 => {
                        let mut effects = render::reply_effects(ConversationId(requester.0), &reply);
                        effects.push(Effect::SendText {
                            conversation_id: conversation,
                            text: render::SENT_PRIVATELY.to_string(),
                        });
                        effects
                    }
                    _ => render::reply_effects(conversation, &reply),
                };
                for effect in effects {
                    self.emit(effect).await;
                }
                Ok(reply)
            }
            Err(err) => {
                if err.is_unauthorized() {
                    warn!(%kind, %requester, %conversation, "control request denied");
                } else {
                    error!(%kind, %requester, %conversation, error = %err, "control request failed");
                }
                self.emit(Effect::SendText {
                    conversation_id: conversation,
                    text: render::error_text(&err),
                })
                .await;
                Err(err)
            }
        }
    }

    async fn execute(&self, request: ControlRequest) -> Result<ControlReply, ControlError> {
        let ControlRequest {
            kind,
            requester,
            conversation_id,
            args,
            attachment,
        } = request;

        let reply = match kind {
            ControlKind::Start => ControlReply::Greeting,
            ControlKind::Help => ControlReply::Help,
            ControlKind::StartReply => {
                self.sessions.start_reply(conversation_id, &requester).await?;
                ControlReply::ReplyStarted
            }
            ControlKind::EndReply => {
                ControlReply::ReplyEnded(self.sessions.end_reply(conversation_id, &requester).await?)
            }
            ControlKind::AddAdmin => {
                let principal = principal_arg(&args)?;
                let outcome = self.admins.add(&principal, &requester).await?;
                ControlReply::AdminAdded { principal, outcome }
            }
            ControlKind::RemoveAdmin => {
                let principal = principal_arg(&args)?;
                self.admins.remove(&principal, &requester).await?;
                ControlReply::AdminRemoved { principal }
            }
            ControlKind::ListAdmins => ControlReply::Admins(self.admins.list().await),
            ControlKind::CreateBackup => {
                if !self.admins.is_admin(&requester).await {
                    return Err(BackupError::Unauthorized.into());
                }
                let (snapshot, document) = self.backups.create_document().await?;
                ControlReply::Backup {
                    document,
                    record_count: snapshot.records.len(),
                }
            }
            ControlKind::RestoreBackup => {
                if !self.admins.is_admin(&requester).await {
                    return Err(BackupError::Unauthorized.into());
                }
                let document = attachment.ok_or(ControlError::MissingArgument("a backup file"))?;
                let policy = match args.first() {
                    Some(raw) => raw.parse::<DedupPolicy>().map_err(|e| {
                        ControlError::InvalidArgument(format!("{e}, expected {}", render::policy_hint()))
                    })?,
                    None => self.config.restore_policy,
                };
                let cancel = self.shutdown.child_token();
                let result = self
                    .backups
                    .restore_from_snapshot(&document.content, policy, &cancel)
                    .await?;
                ControlReply::Restored(result)
            }
            ControlKind::ComputeStats => {
                if !self.admins.is_admin(&requester).await {
                    return Err(ControlError::Unauthorized);
                }
                ControlReply::Stats(self.stats.compute_stats().await?)
            }
            ControlKind::ListMessages => {
                if !self.admins.is_admin(&requester).await {
                    return Err(ControlError::Unauthorized);
                }
                let limit = match args.first() {
                    Some(raw) => raw
                        .parse::<u32>()
                        .map_err(|_| ControlError::InvalidArgument(format!("'{raw}' is not a count")))?,
                    None => self.config.list_limit,
                };
                let records: Vec<MessageRecord> = self
                    .ledger
                    .query_all(SortOrder::Desc, Some(limit))
                    .try_collect()
                    .await?;
                ControlReply::Messages(records)
            }
        };
        Ok(reply)
    }

    /// Deliver one effect. Returns whether the transport accepted it.
    async fn emit(&self, effect: Effect) -> bool {
        match self.sink.deliver(&effect).await {
            Ok(()) => true,
            Err(e) => {
                warn!(conversation = %effect.conversation_id(), error = %e, "effect delivery failed");
                false
            }
        }
    }
}

fn principal_arg(args: &[String]) -> Result<Principal, ControlError> {
    args.first()
        .ok_or(ControlError::MissingArgument("a user id or @handle"))?
        .parse::<Principal>()
        .map_err(ControlError::InvalidArgument)
}
