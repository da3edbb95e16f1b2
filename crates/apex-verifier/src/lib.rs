//! Pre-commit invariant checker (the "Citadel"). `verify` is a pure function:
//! given a proposed transaction and a read-only view of the committed state,
//! it either confirms every global invariant holds or names which one broke.
//! It performs no I/O and holds no mutable state beyond what is passed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use apex_types::{AgentId, Money, Transaction, TransactionKind, TxId};

/// The specific global invariant a rejected transaction would have broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    #[error("transaction checksum does not match recomputed digest")]
    Checksum,
    #[error("conservation invariant violated: sum of balances and escrow changed")]
    Conservation,
    #[error("solvency invariant violated: post-commit balance below debt ceiling")]
    Solvency,
    #[error("debt ceiling invariant violated")]
    DebtCeiling,
    #[error("monotonic time invariant violated: transaction predates the log tail")]
    MonotonicTime,
    #[error("transaction id already present in the log")]
    DuplicateTxId,
    #[error("burn kind transaction targets a non-recognized sink")]
    UnrecognizedBurnSink,
    #[error("referenced agent does not exist")]
    UnknownAgent,
}

/// Read-only view over committed ledger state the verifier needs. The
/// ledger implements this directly against its in-memory maps; it never
/// hands the verifier a mutable handle.
pub trait LedgerStateView {
    /// `(balance, escrow)` for a known agent or system account.
    fn balance_and_escrow(&self, id: &AgentId) -> Option<(Money, Money)>;

    /// The agent's configured floor, below which its balance may never fall.
    fn debt_ceiling(&self, id: &AgentId) -> Option<Money>;

    /// Timestamp of the most recently committed transaction, if any.
    fn last_transaction_timestamp(&self) -> Option<DateTime<Utc>>;

    /// Whether `tx_id` already appears anywhere in the committed log.
    fn contains_tx_id(&self, tx_id: &TxId) -> bool;

    /// Whether `id` is a valid destination for a burn-kind transaction.
    fn is_recognized_burn_sink(&self, id: &AgentId) -> bool;
}

/// `PENALTY` is a conservation-preserving transfer between two accounts;
/// only `BOND_FORFEIT` removes value from circulation. A full forfeiture
/// is issued as two transactions — a `PENALTY` transfer leg and a
/// `BOND_FORFEIT` burn leg — rather than one compound transaction.
fn is_burn_kind(kind: TransactionKind) -> bool {
    matches!(kind, TransactionKind::BondForfeit)
}

/// Runs the eight-step algorithm in spec order, short-circuiting on the
/// first violated invariant.
pub fn verify(tx: &Transaction, view: &impl LedgerStateView) -> Result<(), Violation> {
    // 1. Recompute checksum over canonicalized fields; compare.
    tx.verify_checksum().map_err(|_| Violation::Checksum)?;

    // 2. Determine tx kind class: burn vs. transfer.
    let burn = is_burn_kind(tx.kind);

    let (from_balance, from_escrow) = view
        .balance_and_escrow(&tx.from)
        .ok_or(Violation::UnknownAgent)?;
    let (to_balance, to_escrow) = view
        .balance_and_escrow(&tx.to)
        .ok_or(Violation::UnknownAgent)?;

    let pre_sum = (from_balance + from_escrow) + (to_balance + to_escrow);

    let post_from_balance = from_balance
        .checked_sub(tx.amount)
        .map_err(|_| Violation::Conservation)?;

    // 3. Compute post-state sums for affected agents.
    let post_sum = if burn {
        (post_from_balance + from_escrow) + (to_balance + to_escrow)
    } else {
        let post_to_balance = to_balance
            .checked_add(tx.amount)
            .map_err(|_| Violation::Conservation)?;
        (post_from_balance + from_escrow) + (post_to_balance + to_escrow)
    };

    if burn {
        // 5. Burn kinds: post == pre - amount, and the sink must be recognized.
        let expected = pre_sum
            .checked_sub(tx.amount)
            .map_err(|_| Violation::Conservation)?;
        if post_sum != expected {
            return Err(Violation::Conservation);
        }
        if !view.is_recognized_burn_sink(&tx.to) {
            return Err(Violation::UnrecognizedBurnSink);
        }
    } else {
        // 4. Transfer kinds: post == pre.
        if post_sum != pre_sum {
            return Err(Violation::Conservation);
        }
    }

    // 6. Assert post-state balance of every affected agent >= its debt ceiling.
    let from_ceiling = view.debt_ceiling(&tx.from).ok_or(Violation::UnknownAgent)?;
    if post_from_balance < from_ceiling {
        return Err(Violation::Solvency);
    }
    if !burn {
        let post_to_balance = to_balance.checked_add(tx.amount).map_err(|_| Violation::Conservation)?;
        let to_ceiling = view.debt_ceiling(&tx.to).ok_or(Violation::UnknownAgent)?;
        if post_to_balance < to_ceiling {
            return Err(Violation::Solvency);
        }
    }

    // 7. Assert tx timestamp >= last logged tx timestamp.
    if let Some(last_ts) = view.last_transaction_timestamp() {
        if tx.timestamp < last_ts {
            return Err(Violation::MonotonicTime);
        }
    }

    // 8. Assert tx id is not present in the log index.
    if view.contains_tx_id(&tx.tx_id) {
        return Err(Violation::DuplicateTxId);
    }

    Ok(())
}
