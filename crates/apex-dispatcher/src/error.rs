use thiserror::Error;

use apex_hooks::ViolationKind;
use apex_ledger::LedgerError;
use apex_verifier::Violation;

/// Every internal failure the dispatcher must translate to a wire error
/// code. The dispatcher is the sole translator: no other component
/// constructs a `WireError` directly.
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("internal error: {0}")]
    Internal(String),

    #[error("fiscal insolvency")]
    FiscalInsolvency,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("bond required")]
    BondRequired,
    #[error("debt limit exceeded")]
    DebtLimitExceeded,

    #[error("sandbox escape attempt detected")]
    SandboxEscape,
    #[error("permission denied")]
    PermissionDenied,
    #[error("static-analysis violation (code)")]
    StaticAnalysisCode,
    #[error("static-analysis violation (command)")]
    StaticAnalysisCommand,

    #[error("invariant verification failure: {0}")]
    InvariantFailure(Violation),
    #[error("context window exceeded")]
    ContextWindowExceeded,

    #[error("agent not found")]
    AgentNotFound,
    #[error("agent bankrupt")]
    AgentBankrupt,
    #[error("agent suspended")]
    AgentSuspended,
    #[error("request timed out")]
    TimedOut,
}

impl DispatcherError {
    /// The APEX wire error code.
    pub fn code(&self) -> i32 {
        match self {
            DispatcherError::Parse(_) => -32700,
            DispatcherError::InvalidRequest(_) => -32600,
            DispatcherError::MethodNotFound(_) => -32601,
            DispatcherError::InvalidParams(_) => -32602,
            DispatcherError::Internal(_) => -32603,

            DispatcherError::FiscalInsolvency => -32000,
            DispatcherError::InsufficientFunds => -32001,
            DispatcherError::BondRequired => -32002,
            DispatcherError::DebtLimitExceeded => -32003,

            DispatcherError::SandboxEscape => -32010,
            DispatcherError::PermissionDenied => -32011,
            DispatcherError::StaticAnalysisCode => -32012,
            DispatcherError::StaticAnalysisCommand => -32013,

            DispatcherError::InvariantFailure(_) => -32020,
            DispatcherError::ContextWindowExceeded => -32021,

            DispatcherError::AgentNotFound => -32030,
            DispatcherError::AgentBankrupt => -32031,
            DispatcherError::AgentSuspended => -32032,
            DispatcherError::TimedOut => -32033,
        }
    }
}

/// Maps a hook violation kind to the dispatcher error it becomes when it
/// halts the pipeline.
impl From<ViolationKind> for DispatcherError {
    fn from(kind: ViolationKind) -> Self {
        match kind {
            ViolationKind::HookTimeout => DispatcherError::TimedOut,
            ViolationKind::SecurityViolation => DispatcherError::PermissionDenied,
            ViolationKind::StaticAnalysisCode => DispatcherError::StaticAnalysisCode,
            ViolationKind::StaticAnalysisCommand => DispatcherError::StaticAnalysisCommand,
            ViolationKind::SandboxEscape => DispatcherError::SandboxEscape,
            ViolationKind::ResourceExceeded => DispatcherError::ContextWindowExceeded,
            ViolationKind::FiscalInsolvency => DispatcherError::FiscalInsolvency,
            ViolationKind::PermissionDenied => DispatcherError::PermissionDenied,
        }
    }
}

/// Maps a ledger failure to the dispatcher error a handler surfaces to the
/// caller when a `ledger/*` method's underlying call is rejected.
impl From<LedgerError> for DispatcherError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => DispatcherError::AgentNotFound,
            LedgerError::AlreadyExists(msg) => DispatcherError::InvalidParams(msg),
            LedgerError::InsufficientFunds => DispatcherError::InsufficientFunds,
            LedgerError::InvariantViolation(v) => DispatcherError::InvariantFailure(v),
            LedgerError::Persistence(msg) => DispatcherError::Internal(msg),
            LedgerError::LockHeld => DispatcherError::Internal("ledger lock held".into()),
            LedgerError::ReplayFailure(msg) => DispatcherError::Internal(msg),
            LedgerError::SnapshotCorrupt(msg) => DispatcherError::Internal(msg),
        }
    }
}
