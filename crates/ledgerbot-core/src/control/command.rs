//! Slash-command parsing.
//!
//! Turns `/add_admin@SomeBot @alice` style message bodies into
//! `ControlRequest`s. Unknown commands yield `None` and are ignored.

use ledgerbot_types::event::{ControlKind, ControlRequest, MessageEvent};

/// Split a command body into its kind and whitespace-separated arguments.
pub fn parse_command(body: &str) -> Option<(ControlKind, Vec<String>)> {
    let mut parts = body.split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;
    // `/stats@SomeBot` addresses one bot in a group chat.
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let kind = ControlKind::from_command_name(&name)?;
    Some((kind, parts.map(str::to_string).collect()))
}

/// Build a control request from a message flagged as a command invocation.
pub fn request_from_event(event: &MessageEvent) -> Option<ControlRequest> {
    let (kind, args) = parse_command(&event.body)?;
    Some(ControlRequest {
        kind,
        requester: event.sender.clone(),
        conversation_id: event.conversation_id,
        args,
        attachment: None,
    })
}
