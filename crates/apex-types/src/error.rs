use thiserror::Error;

/// Errors produced while constructing or validating shared APEX value types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("arithmetic overflow in fixed-point money value")]
    Overflow,

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid transaction kind: {0}")]
    InvalidTransactionKind(String),
}
