use chrono::NaiveDate;
use thiserror::Error;

/// Error taxonomy for the token protocol and ledger engine.
///
/// Codec and registry errors are surfaced to the caller verbatim and are
/// never retried automatically: they are either malformed input or an
/// already-resolved redemption race.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The conditional pending -> completed write lost the race. Expected
    /// under concurrent scans of the same physical code, not a bug.
    #[error("transaction already redeemed")]
    AlreadyRedeemed,

    #[error("token is addressed to a different employee")]
    SubjectMismatch,

    #[error("attendance for {0} already has login and logout")]
    AlreadyComplete(NaiveDate),

    #[error("missing or invalid required field: {0}")]
    InsufficientData(&'static str),

    #[error("ledger inconsistency: {0}")]
    ConsistencyViolation(String),

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
