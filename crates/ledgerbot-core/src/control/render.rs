//! Plain-text rendering of control replies and errors.

use std::fmt::Write as _;

use ledgerbot_types::admin::AddOutcome;
use ledgerbot_types::backup::DedupPolicy;
use ledgerbot_types::error::{AdminError, BackupError, ControlError};
use ledgerbot_types::event::{ControlKind, Effect};
use ledgerbot_types::message::{ConversationId, MessageRecord};
use ledgerbot_types::session::EndOutcome;
use ledgerbot_types::stats::{StatsReport, format_duration};

use super::dispatcher::ControlReply;

pub const ACCESS_DENIED: &str = "Access denied: this command is for admins only.";

pub const SENT_PRIVATELY: &str = "The data has been sent to you in a private message.";

const GREETING: &str = "Hi! Every message in this chat is recorded.\n\
Admins can set an auto-reply with /reply and stop it with /endreply.\n\
Send /help for the full command list.";

/// Command reference shown by `/help`.
pub fn help_text() -> String {
    let entries = [
        (ControlKind::Start, "", "greeting"),
        (ControlKind::Help, "", "this list"),
        (ControlKind::ListMessages, " [limit]", "recorded messages, newest first (admin)"),
        (ControlKind::ComputeStats, "", "ledger statistics (admin)"),
        (ControlKind::CreateBackup, "", "download a ledger backup (admin)"),
        (ControlKind::RestoreBackup, " [strict|append-all]", "restore an attached backup (admin)"),
        (ControlKind::StartReply, "", "your next message becomes the auto-reply (admin)"),
        (ControlKind::EndReply, "", "stop auto-replying (admin)"),
        (ControlKind::AddAdmin, " <id|@handle>", "grant admin (admin)"),
        (ControlKind::RemoveAdmin, " <id|@handle>", "revoke admin; the primary admin is permanent (admin)"),
        (ControlKind::ListAdmins, "", "current admins"),
    ];
    let mut out = String::from("Commands:\n");
    for (kind, args, what) in entries {
        let _ = writeln!(out, "{kind}{args} - {what}");
    }
    out
}

pub fn capture_confirmation(reply_text: &str) -> String {
    format!("Auto-reply enabled.\nReply: {reply_text}")
}

fn render_messages(records: &[MessageRecord]) -> String {
    if records.is_empty() {
        return "No messages recorded.".to_string();
    }
    let mut out = String::from("Recorded messages:\n\n");
    for r in records {
        let _ = writeln!(out, "UserID: {}", r.sender_id);
        let _ = writeln!(
            out,
            "Username: {}",
            r.sender_display_name.as_deref().unwrap_or("unknown")
        );
        let _ = writeln!(out, "Message: {}", r.body);
        let _ = writeln!(out, "ChatID: {}", r.conversation_id);
        let _ = writeln!(out, "Date: {}", r.timestamp.format("%Y-%m-%d %H:%M:%S"));
        out.push_str("-----------------------------------\n");
    }
    out
}

fn render_stats(report: &StatsReport) -> String {
    let mut out = String::from("Ledger statistics:\n\n");
    let _ = writeln!(out, "Ledger age: {}", format_duration(report.ledger_age));
    let _ = writeln!(out, "Process uptime: {}", format_duration(report.process_uptime));
    let _ = writeln!(out, "Messages: {}", report.total_messages);
    let _ = writeln!(out, "Unique senders: {}", report.unique_senders);
    let _ = writeln!(out, "Unique chats: {}", report.unique_conversations);
    match report.last_activity {
        Some(ts) => {
            let _ = writeln!(out, "Last activity: {}", ts.format("%Y-%m-%d %H:%M:%S"));
        }
        None => out.push_str("Last activity: none yet\n"),
    }
    if !report.top_senders.is_empty() {
        out.push_str("\nTop senders:\n");
        for (rank, s) in report.top_senders.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} ({}) - {}",
                rank + 1,
                s.sender_id,
                s.display_name.as_deref().unwrap_or("unknown"),
                s.count
            );
        }
    }
    out
}

/// Effects answering a successful control request.
pub fn reply_effects(conversation_id: ConversationId, reply: &ControlReply) -> Vec<Effect> {
    let text = match reply {
        ControlReply::Greeting => GREETING.to_string(),
        ControlReply::Help => help_text(),
        ControlReply::ReplyStarted => "Send the auto-reply text or emoji.".to_string(),
        ControlReply::ReplyEnded(EndOutcome::Ended) => "Auto-reply disabled.".to_string(),
        ControlReply::ReplyEnded(EndOutcome::NotActive) => "Auto-reply is not active.".to_string(),
        ControlReply::AdminAdded {
            principal,
            outcome: AddOutcome::Added,
        } => format!("{principal} is now an admin."),
        ControlReply::AdminAdded {
            principal,
            outcome: AddOutcome::AlreadyExists,
        } => format!("{principal} is already an admin."),
        ControlReply::AdminRemoved { principal } => format!("{principal} is no longer an admin."),
        ControlReply::Admins(admins) => {
            let mut out = String::from("Admins:\n\n");
            for admin in admins {
                let _ = writeln!(out, "• {admin}");
            }
            out
        }
        ControlReply::Backup {
            document,
            record_count,
        } => {
            return vec![Effect::SendDocument {
                conversation_id,
                document: document.clone(),
                caption: format!("Ledger backup ({record_count} records)"),
            }];
        }
        ControlReply::Restored(result) => format!(
            "Backup restored: {} inserted, {} duplicates skipped, {} admins added.",
            result.inserted, result.skipped_duplicates, result.admins_added
        ),
        ControlReply::Stats(report) => render_stats(report),
        ControlReply::Messages(records) => render_messages(records),
    };
    vec![Effect::SendText {
        conversation_id,
        text,
    }]
}

/// User-facing text for a failed control request.
pub fn error_text(err: &ControlError) -> String {
    if err.is_unauthorized() {
        return ACCESS_DENIED.to_string();
    }
    match err {
        ControlError::Admin(AdminError::ImmutablePrincipal(_)) => {
            "The primary admin cannot be changed.".to_string()
        }
        ControlError::Admin(AdminError::NotFound(p)) => format!("{p} is not in the admin list."),
        ControlError::Backup(BackupError::InvalidSnapshot(reason)) => {
            format!("Invalid backup file: {reason}")
        }
        ControlError::Backup(BackupError::UnsupportedSchema { found, .. }) => {
            format!("Unsupported backup version {found}.")
        }
        ControlError::Backup(BackupError::Aborted) => "Restore was cancelled.".to_string(),
        ControlError::MissingArgument(what) => format!("Please provide {what}."),
        ControlError::InvalidArgument(reason) => format!("Invalid argument: {reason}"),
        other => format!("Operation failed: {other}"),
    }
}

/// Hint listing the accepted restore policies.
pub fn policy_hint() -> String {
    format!("{} or {}", DedupPolicy::Strict, DedupPolicy::AppendAll)
}
