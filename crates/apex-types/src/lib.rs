//! Shared scalar types, identifiers, and error taxonomy used by every APEX
//! crate: the fixed-point [`money::Money`] type, agent/transaction records,
//! and the canonicalization routine that both the ledger and the verifier
//! hash against.

pub mod agent;
pub mod canonical;
pub mod error;
pub mod ids;
pub mod money;
pub mod transaction;

pub use agent::{AgentMetadata, AgentRecord, Financials, Performance, Tier, UnitInterval};
pub use error::TypesError;
pub use ids::{AgentId, RequestId, TxId};
pub use money::Money;
pub use transaction::{Transaction, TransactionKind};
