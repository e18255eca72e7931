//! Control plane: command parsing, dispatch and reply rendering.
//!
//! The dispatcher is the single entry point the transport talks to. Inbound
//! messages go through the reply-session state machine and into the ledger;
//! control requests are authorized and routed to the owning component.

pub mod command;
pub mod dispatcher;
pub mod render;
pub mod sink;
