use thiserror::Error;

use crate::amount::AmountError;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Canonical error type for every ledger invocation.
///
/// Any error aborts the invocation it occurred in; the host discards all
/// writes made so far, so no variant ever describes a partial commit.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad arity, out-of-range score, non-integral NFT amount, self-transfer,
    /// zero amount or a malformed argument.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Role attestation or signature verification failed.
    #[error("permission denied: {0}")]
    Auth(String),

    #[error("token {symbol} is locked up until {lock_up_date} (transfer dated {date})")]
    LockUp {
        symbol: String,
        lock_up_date: i64,
        date: i64,
    },

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("overflow: {0}")]
    Overflow(String),

    /// Another invocation committed a key this one read. Safe to retry.
    #[error("write conflict on key {key}")]
    Conflict { key: String },

    #[error("store failure: {0}")]
    Store(String),

    #[error("undecodable state for key {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Closed classification of [`LedgerError`], used for structured error output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Duplicate,
    Auth,
    LockUp,
    InsufficientFunds,
    Overflow,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Duplicate => "DuplicateError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::LockUp => "LockUpError",
            ErrorKind::InsufficientFunds => "InsufficientFundsError",
            ErrorKind::Overflow => "OverflowError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::Duplicate(_) => ErrorKind::Duplicate,
            LedgerError::Auth(_) => ErrorKind::Auth,
            LedgerError::LockUp { .. } => ErrorKind::LockUp,
            LedgerError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            LedgerError::Overflow(_) => ErrorKind::Overflow,
            LedgerError::Conflict { .. } => ErrorKind::Conflict,
            LedgerError::Store(_) | LedgerError::Codec { .. } => ErrorKind::Internal,
        }
    }

    /// Whether the caller (or host) may rerun the invocation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }

    pub(crate) fn arity(function: &str, expected: &str) -> Self {
        LedgerError::Validation(format!(
            "{function} should be called with {expected} argument(s)"
        ))
    }

    pub(crate) fn bad_json(what: &str, err: serde_json::Error) -> Self {
        LedgerError::Validation(format!("malformed {what}: {err}"))
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_name_the_taxonomy() {
        let err = LedgerError::LockUp {
            symbol: "PRV".into(),
            lock_up_date: 10,
            date: 5,
        };
        assert_eq!(err.kind().as_str(), "LockUpError");
        assert!(!err.is_retryable());
        let conflict = LedgerError::Conflict {
            key: "BALANCES/alice/PRV".into(),
        };
        assert!(conflict.is_retryable());
        assert_eq!(
            LedgerError::arity("mint", "1").to_string(),
            "validation error: mint should be called with 1 argument(s)"
        );
    }
}
