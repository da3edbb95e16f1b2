use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apex_types::{AgentId, AgentRecord, Money, Transaction, TxId};
use apex_verifier::LedgerStateView;

/// Whole-ledger metadata, persisted verbatim in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMetadata {
    pub version: u32,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub last_checkpoint_hash: Option<String>,
}

impl LedgerMetadata {
    pub fn new() -> Self {
        LedgerMetadata {
            version: 1,
            currency: "APX".to_string(),
            created_at: Utc::now(),
            last_checkpoint_hash: None,
        }
    }
}

impl Default for LedgerMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// The system bank account: the sole source of `REWARD`/`GENESIS` issuance
/// and the sink of `TAX` collection and `BOND_FORFEIT` burns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBank {
    pub balance: Money,
    pub total_tax_collected: Money,
    pub total_bonds_burned: Money,
}

impl SystemBank {
    pub fn new(initial_balance: Money) -> Self {
        SystemBank {
            balance: initial_balance,
            total_tax_collected: Money::ZERO,
            total_bonds_burned: Money::ZERO,
        }
    }
}

/// The whole in-memory ledger: system bank, agent records, and the
/// append-only transaction log. This is the state the verifier is handed a
/// read-only view of and the state the WAL/snapshot protocol persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    pub metadata: LedgerMetadata,
    pub system_bank: SystemBank,
    pub agents: HashMap<AgentId, AgentRecord>,
    pub transaction_log: Vec<Transaction>,
}

impl LedgerState {
    pub fn new(initial_bank_balance: Money) -> Self {
        LedgerState {
            metadata: LedgerMetadata::new(),
            system_bank: SystemBank::new(initial_bank_balance),
            agents: HashMap::new(),
            transaction_log: Vec::new(),
        }
    }

    pub fn last_tx_id(&self) -> Option<TxId> {
        self.transaction_log.last().map(|tx| tx.tx_id)
    }

    fn is_system_account(id: &AgentId) -> bool {
        id.as_str() == AgentId::SYSTEM_BANK
            || id.as_str() == AgentId::SYSTEM_ESCROW
            || id.as_str() == AgentId::SYSTEM_TREASURY
    }
}

/// `apex_verifier::verify` is handed `&LedgerState` directly: the ledger
/// never copies its maps just to satisfy the verifier's read-only contract.
impl LedgerStateView for LedgerState {
    fn balance_and_escrow(&self, id: &AgentId) -> Option<(Money, Money)> {
        if id.as_str() == AgentId::SYSTEM_BANK {
            return Some((self.system_bank.balance, Money::ZERO));
        }
        if Self::is_system_account(id) {
            return Some((Money::ZERO, Money::ZERO));
        }
        self.agents
            .get(id)
            .map(|a| (a.financials.balance, a.financials.escrow))
    }

    fn debt_ceiling(&self, id: &AgentId) -> Option<Money> {
        if Self::is_system_account(id) {
            return Some(Money::from_hundredths(i64::MIN));
        }
        self.agents.get(id).map(|a| a.financials.debt_ceiling)
    }

    fn last_transaction_timestamp(&self) -> Option<DateTime<Utc>> {
        self.transaction_log.last().map(|tx| tx.timestamp)
    }

    fn contains_tx_id(&self, tx_id: &TxId) -> bool {
        self.transaction_log.iter().any(|tx| &tx.tx_id == tx_id)
    }

    fn is_recognized_burn_sink(&self, id: &AgentId) -> bool {
        id.as_str() == AgentId::SYSTEM_TREASURY
    }
}
