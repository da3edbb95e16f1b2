use thiserror::Error;

use apex_verifier::Violation;

/// Failure taxonomy for every ledger operation. Each variant maps to exactly
/// one wire error code at the dispatcher boundary; the ledger itself never
/// retries or silently recovers from one of these.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("agent {0} already exists")]
    AlreadyExists(String),

    #[error("agent {0} not found")]
    NotFound(String),

    #[error("insufficient funds: transfer would breach debt ceiling")]
    InsufficientFunds,

    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] Violation),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("ledger file lock is already held by another process")]
    LockHeld,

    #[error("WAL replay failed: {0}")]
    ReplayFailure(String),

    #[error("snapshot is corrupt: {0}")]
    SnapshotCorrupt(String),
}
