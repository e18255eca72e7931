//! Admin principal types.
//!
//! A `Principal` is either a numeric account id or a handle. Handles are
//! stored without the leading `@` and compared case-insensitively.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::message::SenderId;

/// An actor eligible to hold admin privilege.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    Id(i64),
    Handle(String),
}

impl Principal {
    /// Build a handle principal, stripping `@` and lowercasing.
    pub fn handle(raw: &str) -> Self {
        Principal::Handle(raw.trim().trim_start_matches('@').to_lowercase())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Id(id) => write!(f, "{id}"),
            Principal::Handle(handle) => write!(f, "@{handle}"),
        }
    }
}

impl FromStr for Principal {
    type Err = String;

    /// Integers become ids; anything else is a handle with `@` stripped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(Principal::Id(id));
        }
        let handle = trimmed.trim_start_matches('@');
        if handle.is_empty() || handle.chars().any(char::is_whitespace) {
            return Err(format!("invalid principal: '{s}'"));
        }
        Ok(Principal::handle(handle))
    }
}

impl From<SenderId> for Principal {
    fn from(id: SenderId) -> Self {
        Principal::Id(id.0)
    }
}

/// The resolved identity behind an inbound message or control request.
///
/// The transport resolves its own identity scheme down to an id and,
/// when the account has one, a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: SenderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl Requester {
    pub fn new(id: i64) -> Self {
        Self {
            id: SenderId(id),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Every principal this requester can be matched as.
    pub fn principals(&self) -> Vec<Principal> {
        let mut out = vec![Principal::from(self.id)];
        if let Some(handle) = self.handle.as_deref().filter(|h| !h.trim().is_empty()) {
            out.push(Principal::handle(handle));
        }
        out
    }
}

/// Result of a successful `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    AlreadyExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_principal() {
        assert_eq!("381200758".parse::<Principal>().unwrap(), Principal::Id(381200758));
        assert_eq!(" -5 ".parse::<Principal>().unwrap(), Principal::Id(-5));
    }

    #[test]
    fn test_parse_handle_strips_at_and_lowercases() {
        assert_eq!(
            "@Alice".parse::<Principal>().unwrap(),
            Principal::Handle("alice".to_string())
        );
        assert_eq!(
            "bob".parse::<Principal>().unwrap(),
            Principal::Handle("bob".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_empty_handle() {
        assert!("@".parse::<Principal>().is_err());
        assert!("".parse::<Principal>().is_err());
        assert!("two words".parse::<Principal>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for p in [Principal::Id(12), Principal::handle("carol")] {
            assert_eq!(p.to_string().parse::<Principal>().unwrap(), p);
        }
    }

    #[test]
    fn test_untagged_serde() {
        let json = serde_json::to_string(&vec![Principal::Id(1), Principal::handle("x")]).unwrap();
        assert_eq!(json, r#"[1,"x"]"#);
        let parsed: Vec<Principal> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![Principal::Id(1), Principal::handle("x")]);
    }

    #[test]
    fn test_requester_principals_include_handle() {
        let r = Requester::new(9).with_handle("@Dora");
        assert_eq!(
            r.principals(),
            vec![Principal::Id(9), Principal::Handle("dora".to_string())]
        );
        assert_eq!(Requester::new(9).principals(), vec![Principal::Id(9)]);
    }
}
