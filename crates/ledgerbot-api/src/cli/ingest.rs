//! `lbot ingest`: line-delimited JSON transport.
//!
//! Each stdin line is one `Inbound` event (`{"event":"message",...}` or
//! `{"event":"control",...}`). Effects are written to stdout as JSON lines by
//! the dispatcher's sink. Lines are handled in order, so events of one
//! conversation are never reordered.

use std::fmt::Display;
use std::future::Future;

use anyhow::Result;
use ledgerbot_types::event::Inbound;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::state::{AppState, ConcreteDispatcher};

/// Totals reported when the input ends.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub handled: u64,
    pub malformed: u64,
    pub failed: u64,
}

/// Parse one protocol line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Result<Inbound, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

/// Run until stdin closes or Ctrl+C.
///
/// Ctrl+C cancels the dispatcher's shutdown token, which aborts a restore that
/// has not reached its swap yet.
pub async fn run(state: &AppState, json: bool) -> Result<()> {
    let shutdown = state.dispatcher.shutdown_token().clone();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down ingest");
            on_signal.cancel();
        }
    });

    tracing::info!(data_dir = %state.data_dir.display(), "ingest started");
    let dispatcher: &ConcreteDispatcher = &state.dispatcher;
    let summary = pump(BufReader::new(tokio::io::stdin()), &shutdown, move |inbound| {
        dispatcher.handle_inbound(inbound)
    })
    .await?;

    tracing::info!(
        handled = summary.handled,
        malformed = summary.malformed,
        failed = summary.failed,
        "ingest finished"
    );
    if json {
        eprintln!(
            "{}",
            serde_json::json!({
                "handled": summary.handled,
                "malformed": summary.malformed,
                "failed": summary.failed,
            })
        );
    }
    Ok(())
}

/// Feed every line of `reader` to `handle` until EOF or `shutdown`.
///
/// Lines that are not UTF-8 or not a valid event are counted as malformed and
/// skipped. Only a read error from `reader` itself ends the loop early.
pub async fn pump<R, F, Fut, E>(
    mut reader: R,
    shutdown: &CancellationToken,
    mut handle: F,
) -> std::io::Result<IngestSummary>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(Inbound) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut summary = IngestSummary::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "inbound line is not UTF-8, skipped");
                summary.malformed += 1;
                continue;
            }
        };
        let inbound = match parse_line(line) {
            None => continue,
            Some(Ok(inbound)) => inbound,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "malformed inbound line skipped");
                summary.malformed += 1;
                continue;
            }
        };

        match handle(inbound).await {
            Ok(()) => summary.handled += 1,
            Err(e) => {
                tracing::error!(error = %e, "inbound event failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blank_line() {
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn test_parse_message_line() {
        let line = r#"{"event":"message","sender":{"id":3,"handle":"ana"},"conversation_id":10,"body":"hey","timestamp":"2024-01-01T00:00:00Z"}"#;
        match parse_line(line) {
            Some(Ok(Inbound::Message(ev))) => {
                assert_eq!(ev.body, "hey");
                assert!(!ev.is_command_invocation);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_control_line() {
        let line = r#"{"event":"control","kind":"compute_stats","requester":{"id":1},"conversation_id":10}"#;
        assert!(matches!(parse_line(line), Some(Ok(Inbound::Control(_)))));
    }

    #[test]
    fn test_parse_malformed_line() {
        assert!(matches!(parse_line("{not json"), Some(Err(_))));
    }

    const CONTROL: &str = r#"{"event":"control","kind":"compute_stats","requester":{"id":1},"conversation_id":10}"#;

    #[tokio::test]
    async fn test_pump_skips_invalid_utf8_and_keeps_reading() {
        let mut bytes = vec![0xff, 0xfe, b'\n'];
        bytes.extend_from_slice(format!("{CONTROL}\n{{broken\n\n{CONTROL}").as_bytes());

        let mut seen = Vec::new();
        let summary = pump(BufReader::new(&bytes[..]), &CancellationToken::new(), |inbound| {
            seen.push(inbound);
            async { Ok::<(), String>(()) }
        })
        .await
        .unwrap();

        assert_eq!(
            summary,
            IngestSummary {
                handled: 2,
                malformed: 2,
                failed: 0,
            }
        );
        assert!(seen.iter().all(|i| matches!(i, Inbound::Control(_))));
    }

    #[tokio::test]
    async fn test_pump_counts_handler_failures() {
        let input = format!("{CONTROL}\n{CONTROL}\n");
        let mut calls = 0;
        let summary = pump(BufReader::new(input.as_bytes()), &CancellationToken::new(), |_| {
            calls += 1;
            let outcome = if calls == 1 { Err("disk full") } else { Ok(()) };
            async move { outcome }
        })
        .await
        .unwrap();
        assert_eq!(summary.handled, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_pump_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let summary = pump(BufReader::new(CONTROL.as_bytes()), &shutdown, |_| async {
            Ok::<(), String>(())
        })
        .await
        .unwrap();
        assert_eq!(summary, IngestSummary::default());
    }
}
