//! Effect sink that writes one JSON object per line to stdout.

use ledgerbot_core::control::sink::EffectSink;
use ledgerbot_types::error::DeliveryError;
use ledgerbot_types::event::Effect;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Line-delimited JSON effect writer; the transport reads these back.
pub struct StdoutSink {
    out: Mutex<tokio::io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize an effect as a single protocol line.
pub fn effect_line(effect: &Effect) -> Result<String, DeliveryError> {
    let mut line = serde_json::to_string(effect).map_err(|e| DeliveryError::Failed(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

impl EffectSink for StdoutSink {
    async fn deliver(&self, effect: &Effect) -> Result<(), DeliveryError> {
        let line = effect_line(effect)?;
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;
        out.flush().await.map_err(|e| DeliveryError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerbot_types::message::ConversationId;

    #[test]
    fn test_effect_line_is_single_json_line() {
        let effect = Effect::SendText {
            conversation_id: ConversationId(5),
            text: "two\nlines".to_string(),
        };
        let line = effect_line(&effect).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let back: Effect = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back, effect);
    }
}
