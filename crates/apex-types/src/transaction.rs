use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::ids::{AgentId, TxId};
use crate::money::Money;

/// The reason a value movement happened, used by the verifier to select which
/// conservation rule applies and by the ledger to render audit trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Transfer,
    Reward,
    Tax,
    BondLock,
    BondReturn,
    BondForfeit,
    Royalty,
    Penalty,
    Genesis,
}

impl TransactionKind {
    /// `true` for kinds that the bank, not another agent, must originate.
    pub fn is_system_originated(self) -> bool {
        matches!(
            self,
            TransactionKind::Reward
                | TransactionKind::Tax
                | TransactionKind::BondForfeit
                | TransactionKind::Genesis
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Transfer => "TRANSFER",
            TransactionKind::Reward => "REWARD",
            TransactionKind::Tax => "TAX",
            TransactionKind::BondLock => "BOND_LOCK",
            TransactionKind::BondReturn => "BOND_RETURN",
            TransactionKind::BondForfeit => "BOND_FORFEIT",
            TransactionKind::Royalty => "ROYALTY",
            TransactionKind::Penalty => "PENALTY",
            TransactionKind::Genesis => "GENESIS",
        };
        write!(f, "{s}")
    }
}

/// A single, checksummed value movement between two agents (or an agent and
/// one of the system accounts). Transactions are immutable once checksummed;
/// the checksum covers every field below except itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: TxId,
    pub timestamp: DateTime<Utc>,
    pub from: AgentId,
    pub to: AgentId,
    pub amount: Money,
    pub kind: TransactionKind,
    pub task_ref: Option<String>,
    pub checksum: String,
}

impl Transaction {
    /// Build the canonical (sorted-key, checksum-excluded) view of this
    /// transaction used both to compute and to verify `checksum`.
    pub fn canonical_payload(&self) -> Result<serde_json::Value, TypesError> {
        let value = serde_json::json!({
            "tx_id": self.tx_id,
            "timestamp": self.timestamp.to_rfc3339(),
            "from": self.from,
            "to": self.to,
            "amount": self.amount.hundredths(),
            "kind": self.kind,
            "task_ref": self.task_ref,
        });
        crate::canonical::sort_keys(value).map_err(TypesError::InvalidRecord)
    }

    /// Recompute the SHA-256 checksum over the canonical payload.
    pub fn compute_checksum(&self) -> Result<String, TypesError> {
        let payload = self.canonical_payload()?;
        Ok(crate::canonical::sha256_hex(&payload))
    }

    /// Returns `Ok(())` if `checksum` matches the recomputed value.
    pub fn verify_checksum(&self) -> Result<(), TypesError> {
        let expected = self.compute_checksum()?;
        if expected == self.checksum {
            Ok(())
        } else {
            Err(TypesError::InvalidRecord(format!(
                "checksum mismatch: expected {expected}, got {}",
                self.checksum
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(amount: Money) -> Transaction {
        let mut tx = Transaction {
            tx_id: TxId::new(),
            timestamp: Utc::now(),
            from: AgentId::new("agent-a").unwrap(),
            to: AgentId::new("agent-b").unwrap(),
            amount,
            kind: TransactionKind::Transfer,
            task_ref: None,
            checksum: String::new(),
        };
        tx.checksum = tx.compute_checksum().unwrap();
        tx
    }

    #[test]
    fn checksum_round_trips() {
        let tx = sample(Money::from_apx(10));
        assert!(tx.verify_checksum().is_ok());
    }

    #[test]
    fn checksum_detects_tampering() {
        let mut tx = sample(Money::from_apx(10));
        tx.amount = Money::from_apx(11);
        assert!(tx.verify_checksum().is_err());
    }

    #[test]
    fn system_originated_kinds_are_flagged() {
        assert!(TransactionKind::Reward.is_system_originated());
        assert!(!TransactionKind::Transfer.is_system_originated());
    }
}
