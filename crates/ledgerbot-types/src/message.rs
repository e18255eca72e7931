//! Message ledger domain types.
//!
//! A `MessageRecord` is one immutable entry of the append-only ledger. The
//! ledger assigns `id`; everything else comes from the inbound event.

use chrono::{DateTime, Datelike, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Identifier of the account that authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(pub i64);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a conversation (a chat, group or channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message that has not been written to the ledger yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: SenderId,
    /// Display name or handle of the sender at the time of writing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    pub conversation_id: ConversationId,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl NewMessage {
    /// Truncate the timestamp to the precision the ledger persists.
    ///
    /// Records read back from storage compare equal to the value returned by
    /// `append` only if both went through this normalization.
    pub fn normalized(mut self) -> Self {
        self.timestamp = normalize_timestamp(self.timestamp);
        self
    }

    /// Reject messages the ledger could not read back.
    pub fn validate(&self) -> Result<(), String> {
        if !timestamp_in_range(self.timestamp) {
            return Err(format!(
                "timestamp {} is outside the supported years {}..={}",
                self.timestamp,
                MIN_YEAR,
                MAX_YEAR
            ));
        }
        Ok(())
    }

    /// The tuple used by strict de-duplication on restore.
    pub fn dedup_key(&self) -> (SenderId, ConversationId, &str, DateTime<Utc>) {
        (
            self.sender_id,
            self.conversation_id,
            self.body.as_str(),
            self.timestamp,
        )
    }
}

/// A message as stored in the ledger. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Ledger-assigned id: strictly increasing, never reused.
    pub id: i64,
    pub sender_id: SenderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    pub conversation_id: ConversationId,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    /// Attach a ledger id to a pending message.
    pub fn from_new(id: i64, msg: NewMessage) -> Self {
        Self {
            id,
            sender_id: msg.sender_id,
            sender_display_name: msg.sender_display_name,
            conversation_id: msg.conversation_id,
            body: msg.body,
            timestamp: msg.timestamp,
        }
    }

    /// Drop the ledger id, e.g. to re-append a record during restore.
    pub fn into_new(self) -> NewMessage {
        NewMessage {
            sender_id: self.sender_id,
            sender_display_name: self.sender_display_name,
            conversation_id: self.conversation_id,
            body: self.body,
            timestamp: self.timestamp,
        }
    }
}

/// Stored timestamps are four-digit-year RFC 3339 text.
pub const MIN_YEAR: i32 = 0;
pub const MAX_YEAR: i32 = 9999;

/// Whether `ts` survives the ledger's text encoding.
pub fn timestamp_in_range(ts: DateTime<Utc>) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&ts.year())
}

/// Ledger timestamps are kept at microsecond precision.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> NewMessage {
        NewMessage {
            sender_id: SenderId(42),
            sender_display_name: Some("ana".to_string()),
            conversation_id: ConversationId(-1001),
            body: "hello".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"sender_id\":42"));
        assert!(json.contains("\"conversation_id\":-1001"));
    }

    #[test]
    fn test_missing_display_name_is_omitted() {
        let mut msg = sample();
        msg.sender_display_name = None;
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("sender_display_name"));
    }

    #[test]
    fn test_normalized_truncates_to_micros() {
        let mut msg = sample();
        msg.timestamp = msg.timestamp + chrono::Duration::nanoseconds(1_234_567);
        let normalized = msg.normalized();
        assert_eq!(normalized.timestamp.timestamp_subsec_nanos(), 1_234_000);
    }

    #[test]
    fn test_validate_rejects_five_digit_years() {
        assert!(sample().validate().is_ok());

        let mut far = sample();
        far.timestamp = "+10000-01-01T00:00:00Z".parse().unwrap();
        assert!(far.validate().unwrap_err().contains("10000"));
    }

    #[test]
    fn test_record_into_new_keeps_content() {
        let record = MessageRecord::from_new(7, sample());
        assert_eq!(record.id, 7);
        assert_eq!(record.into_new(), sample());
    }
}
