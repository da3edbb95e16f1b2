//! The Master Compensation Engine: the sole authority for durable agent
//! balances. Every mutation goes through a write-ahead log before it is
//! applied in memory, and every proposed transaction is checked by
//! [`apex_verifier`] before it is allowed to commit.

pub mod error;
pub mod ledger;
pub mod snapshot;
pub mod state;
pub mod wal;

pub use error::LedgerError;
pub use ledger::{Ledger, LedgerConfig, LedgerView, DEFAULT_DEBT_CEILING_APX, INITIAL_AGENT_BALANCE_APX};
pub use state::{LedgerMetadata, LedgerState, SystemBank};
