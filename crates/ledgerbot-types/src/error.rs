use thiserror::Error;

use crate::admin::Principal;

/// Errors from repository operations (used by trait definitions in ledgerbot-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Errors related to ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidRecord(reason) => LedgerError::InvalidMessage(reason),
            other => LedgerError::Storage(other.to_string()),
        }
    }
}

/// Errors related to admin registry operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("access denied")]
    Unauthorized,

    #[error("principal {0} is the primary admin and cannot be changed")]
    ImmutablePrincipal(Principal),

    #[error("principal {0} is not an admin")]
    NotFound(Principal),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors related to reply session transitions.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("access denied")]
    Unauthorized,
}

/// Errors related to backup creation and restore.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("access denied")]
    Unauthorized,

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unsupported snapshot schema version {found} (supported: {supported:?})")]
    UnsupportedSchema { found: u64, supported: Vec<u32> },

    #[error("restore aborted before the ledger was modified")]
    Aborted,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Failure to deliver an outbound effect. Logged, never rolled back.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Any failure of a control request, as seen by the dispatcher.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("access denied")]
    Unauthorized,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Reply(#[from] ReplyError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ControlError {
    /// True for the access-denied family, whatever the component.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ControlError::Unauthorized
                | ControlError::Admin(AdminError::Unauthorized)
                | ControlError::Reply(ReplyError::Unauthorized)
                | ControlError::Backup(BackupError::Unauthorized)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_ledger_error_from_repository() {
        let err: LedgerError = RepositoryError::Connection.into();
        assert_eq!(err.to_string(), "storage error: database connection error");
    }

    #[test]
    fn test_invalid_record_maps_to_invalid_message() {
        let err: LedgerError = RepositoryError::InvalidRecord("year 10000".to_string()).into();
        assert!(matches!(err, LedgerError::InvalidMessage(ref r) if r == "year 10000"));
    }

    #[test]
    fn test_immutable_principal_display() {
        let err = AdminError::ImmutablePrincipal(Principal::Id(7));
        assert!(err.to_string().contains("7"));
    }

    #[test]
    fn test_unsupported_schema_display() {
        let err = BackupError::UnsupportedSchema {
            found: 9,
            supported: vec![1],
        };
        assert!(err.to_string().contains("9"));
        assert!(err.to_string().contains("[1]"));
    }

    #[test]
    fn test_control_error_is_unauthorized() {
        assert!(ControlError::from(AdminError::Unauthorized).is_unauthorized());
        assert!(ControlError::from(BackupError::Unauthorized).is_unauthorized());
        assert!(!ControlError::MissingArgument("principal").is_unauthorized());
    }
}
