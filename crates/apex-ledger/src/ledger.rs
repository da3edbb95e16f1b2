use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info};

use apex_types::{
    AgentId, AgentMetadata, AgentRecord, Financials, Money, Performance, Tier, Transaction,
    TransactionKind, TxId, UnitInterval,
};
use apex_verifier::verify;

use crate::error::LedgerError;
use crate::state::LedgerState;
use crate::{snapshot, wal};

/// Agent starting balance per the external interface defaults.
pub const INITIAL_AGENT_BALANCE_APX: i64 = 100;
/// Default per-agent debt ceiling.
pub const DEFAULT_DEBT_CEILING_APX: i64 = -100;

/// Filesystem layout and starting values the ledger needs to bootstrap.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub root: PathBuf,
    pub initial_bank_balance: Money,
    pub initial_agent_balance: Money,
    pub default_debt_ceiling: Money,
}

impl LedgerConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join("ledger.snapshot.json")
    }

    pub fn wal_path(&self) -> PathBuf {
        self.root.join("ledger.wal")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("ledger.lock")
    }
}

/// A read-only, point-in-time copy of the whole ledger, handed back to
/// callers such as the `ledger/snapshot` method.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerView {
    pub metadata: crate::state::LedgerMetadata,
    pub system_bank: crate::state::SystemBank,
    pub agents: HashMap<AgentId, AgentRecord>,
    pub transaction_log: Vec<Transaction>,
}

/// The Master Compensation Engine: sole authority for persisting balance
/// changes. Holds the advisory file lock on `ledger.lock` for the lifetime
/// of the process; exactly one `Ledger` may be live per `ledger_path` at a
/// time, matching the single-writer concurrency model.
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
    config: LedgerConfig,
    _write_guard: fd_lock::RwLockWriteGuard<'static, std::fs::File>,
}

impl Ledger {
    /// Bootstraps a ledger rooted at `config.root`: acquires the advisory
    /// file lock, loads the last snapshot (or starts fresh), and replays
    /// every WAL record written since that checkpoint.
    pub async fn bootstrap(config: LedgerConfig) -> Result<Self, LedgerError> {
        tokio::fs::create_dir_all(&config.root)
            .await
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(config.lock_path())
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        // Leaked for the process lifetime: the write guard below needs a
        // `'static` borrow so it can live inside `Ledger` without a
        // self-referential struct. One `Ledger` is bootstrapped per process.
        let lock: &'static mut fd_lock::RwLock<std::fs::File> =
            Box::leak(Box::new(fd_lock::RwLock::new(lock_file)));
        let write_guard = lock.try_write().map_err(|_| LedgerError::LockHeld)?;

        let state = snapshot::load(&config.snapshot_path(), config.initial_bank_balance).await?;
        let mut state = state;

        let wal_records = wal::read_all(&config.wal_path()).await.map_err(|e| {
            error!(error = %e, "WAL replay failed, aborting bootstrap");
            e
        })?;

        let starting_count = state.transaction_log.len();
        for tx in wal_records {
            if state.transaction_log.iter().any(|t| t.tx_id == tx.tx_id) {
                continue;
            }
            state.transaction_log.push(tx);
        }
        let replayed = state.transaction_log.len() - starting_count;
        if replayed > 0 {
            info!(replayed, "recovered transactions from WAL");
        }

        Ok(Ledger {
            state: Arc::new(Mutex::new(state)),
            config,
            _write_guard: write_guard,
        })
    }

    /// Registers a new agent, crediting it `initial_agent_balance` debited
    /// from the system bank.
    pub async fn create_agent(&self, id: AgentId, tier: Tier) -> Result<(), LedgerError> {
        if id.is_reserved() {
            return Err(LedgerError::AlreadyExists(id.to_string()));
        }

        let mut state = self.state.lock().await;
        if state.agents.contains_key(&id) {
            return Err(LedgerError::AlreadyExists(id.to_string()));
        }

        let amount = self.config.initial_agent_balance;
        let bank_post = state
            .system_bank
            .balance
            .checked_sub(amount)
            .map_err(|_| LedgerError::InsufficientFunds)?;
        if bank_post.hundredths() < 0 {
            return Err(LedgerError::InsufficientFunds);
        }

        let tx = self.build_tx(
            &state,
            AgentId::system_bank(),
            id.clone(),
            amount,
            TransactionKind::Genesis,
            None,
        )?;
        verify(&tx, &*state).map_err(LedgerError::InvariantViolation)?;

        wal::append_record(&self.config.wal_path(), &tx).await?;

        state.system_bank.balance = bank_post;
        state.agents.insert(
            id,
            AgentRecord {
                financials: Financials {
                    balance: amount,
                    escrow: Money::ZERO,
                    lifetime_earnings: Money::ZERO,
                    debt_ceiling: self.config.default_debt_ceiling,
                },
                performance: Performance {
                    streak: 0,
                    success_rate: UnitInterval::new(1.0).expect("1.0 is in range"),
                    avg_efficiency: UnitInterval::new(1.0).expect("1.0 is in range"),
                    reputation: UnitInterval::new(0.5).expect("0.5 is in range"),
                },
                metadata: AgentMetadata {
                    tier,
                    base_rate: Money::from_apx(10),
                    last_active: Utc::now(),
                },
                active: true,
            },
        );
        state.transaction_log.push(tx);

        Ok(())
    }

    /// Current balance of an agent or system account.
    pub async fn get_balance(&self, id: &AgentId) -> Result<Money, LedgerError> {
        let state = self.state.lock().await;
        if id.as_str() == AgentId::SYSTEM_BANK {
            return Ok(state.system_bank.balance);
        }
        state
            .agents
            .get(id)
            .map(|a| a.financials.balance)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Returns the full agent record.
    pub async fn get_agent(&self, id: &AgentId) -> Result<AgentRecord, LedgerError> {
        let state = self.state.lock().await;
        state
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Proposes, verifies, and commits a transfer. Durability precedes the
    /// in-memory mutation: the WAL append must succeed before any balance
    /// changes, and any rejection leaves state bit-identical to before the
    /// call.
    pub async fn transfer(
        &self,
        from: AgentId,
        to: AgentId,
        amount: Money,
        kind: TransactionKind,
        task_ref: Option<String>,
    ) -> Result<TxId, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvariantViolation(
                apex_verifier::Violation::Conservation,
            ));
        }

        let mut state = self.state.lock().await;

        let tx = self.build_tx(&state, from.clone(), to.clone(), amount, kind, task_ref)?;
        verify(&tx, &*state).map_err(|violation| match violation {
            apex_verifier::Violation::Solvency => LedgerError::InsufficientFunds,
            other => LedgerError::InvariantViolation(other),
        })?;

        wal::append_record(&self.config.wal_path(), &tx).await?;

        self.apply_committed(&mut state, &tx);
        state.transaction_log.push(tx.clone());

        Ok(tx.tx_id)
    }

    fn apply_committed(&self, state: &mut LedgerState, tx: &Transaction) {
        // PENALTY is a conservation-preserving transfer; only BOND_FORFEIT
        // removes value from circulation. A full forfeiture is issued as a
        // PENALTY leg plus a separate BOND_FORFEIT leg, not one transaction.
        let burn = matches!(tx.kind, TransactionKind::BondForfeit);

        self.debit(state, &tx.from, tx.amount);
        if burn {
            state.system_bank.total_bonds_burned =
                state.system_bank.total_bonds_burned + tx.amount;
        } else {
            self.credit(state, &tx.to, tx.amount);
        }

        if tx.kind == TransactionKind::Tax {
            state.system_bank.total_tax_collected =
                state.system_bank.total_tax_collected + tx.amount;
        }

        if let Some(agent) = state.agents.get_mut(&tx.from) {
            agent.metadata.last_active = tx.timestamp;
        }
        if let Some(agent) = state.agents.get_mut(&tx.to) {
            agent.metadata.last_active = tx.timestamp;
        }
    }

    fn debit(&self, state: &mut LedgerState, id: &AgentId, amount: Money) {
        if id.as_str() == AgentId::SYSTEM_BANK {
            state.system_bank.balance = state.system_bank.balance - amount;
        } else if let Some(agent) = state.agents.get_mut(id) {
            agent.financials.balance = agent.financials.balance - amount;
        }
    }

    fn credit(&self, state: &mut LedgerState, id: &AgentId, amount: Money) {
        if id.as_str() == AgentId::SYSTEM_BANK {
            state.system_bank.balance = state.system_bank.balance + amount;
        } else if let Some(agent) = state.agents.get_mut(id) {
            agent.financials.balance = agent.financials.balance + amount;
        }
    }

    fn build_tx(
        &self,
        state: &LedgerState,
        from: AgentId,
        to: AgentId,
        amount: Money,
        kind: TransactionKind,
        task_ref: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        let from_known = from.as_str() == AgentId::SYSTEM_BANK || state.agents.contains_key(&from);
        let to_known = matches!(
            to.as_str(),
            AgentId::SYSTEM_BANK | AgentId::SYSTEM_ESCROW | AgentId::SYSTEM_TREASURY
        ) || state.agents.contains_key(&to);
        if !from_known {
            return Err(LedgerError::NotFound(from.to_string()));
        }
        if !to_known {
            return Err(LedgerError::NotFound(to.to_string()));
        }

        let mut tx = Transaction {
            tx_id: TxId::new(),
            timestamp: Utc::now(),
            from,
            to,
            amount,
            kind,
            task_ref,
            checksum: String::new(),
        };
        tx.checksum = tx
            .compute_checksum()
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;
        Ok(tx)
    }

    /// Updates an agent's non-financial performance fields only. Must never
    /// touch balances.
    pub async fn apply_performance_update(
        &self,
        id: &AgentId,
        streak_delta: i64,
        success_rate: Option<UnitInterval>,
        avg_efficiency: Option<UnitInterval>,
        reputation: Option<UnitInterval>,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        let agent = state
            .agents
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        agent.performance.streak = (agent.performance.streak as i64 + streak_delta).max(0) as u32;
        if let Some(v) = success_rate {
            agent.performance.success_rate = v;
        }
        if let Some(v) = avg_efficiency {
            agent.performance.avg_efficiency = v;
        }
        if let Some(v) = reputation {
            agent.performance.reputation = v;
        }
        Ok(())
    }

    /// Returns a read-only copy of the entire ledger.
    pub async fn snapshot(&self) -> LedgerView {
        let state = self.state.lock().await;
        LedgerView {
            metadata: state.metadata.clone(),
            system_bank: state.system_bank.clone(),
            agents: state.agents.clone(),
            transaction_log: state.transaction_log.clone(),
        }
    }

    /// Writes a new durable snapshot and truncates the WAL. Should be
    /// invoked periodically (or on clean shutdown) by the owning server.
    pub async fn checkpoint(&self) -> Result<(), LedgerError> {
        let state = self.state.lock().await;
        let hash = snapshot::write_atomic(&self.config.snapshot_path(), &state).await?;
        drop(state);
        wal::truncate(&self.config.wal_path()).await?;
        info!(checkpoint_hash = %hash, "ledger checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(root: PathBuf) -> LedgerConfig {
        LedgerConfig {
            root,
            initial_bank_balance: Money::from_apx(10_000),
            initial_agent_balance: Money::from_apx(100),
            default_debt_ceiling: Money::from_apx(-100),
        }
    }

    #[tokio::test]
    async fn genesis_transfer_debits_bank_and_credits_agent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::bootstrap(test_config(dir.path().to_path_buf()))
            .await
            .unwrap();

        let id = AgentId::new("agent-a").unwrap();
        ledger.create_agent(id.clone(), Tier::Novice).await.unwrap();

        assert_eq!(ledger.get_balance(&id).await.unwrap(), Money::from_apx(100));
        assert_eq!(
            ledger.get_balance(&AgentId::system_bank()).await.unwrap(),
            Money::from_apx(9_900)
        );
    }

    #[tokio::test]
    async fn duplicate_agent_creation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::bootstrap(test_config(dir.path().to_path_buf()))
            .await
            .unwrap();

        let id = AgentId::new("agent-a").unwrap();
        ledger.create_agent(id.clone(), Tier::Novice).await.unwrap();
        assert!(matches!(
            ledger.create_agent(id, Tier::Novice).await,
            Err(LedgerError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn transfer_moves_balance_between_agents() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::bootstrap(test_config(dir.path().to_path_buf()))
            .await
            .unwrap();

        let a = AgentId::new("a").unwrap();
        let b = AgentId::new("b").unwrap();
        ledger.create_agent(a.clone(), Tier::Novice).await.unwrap();
        ledger.create_agent(b.clone(), Tier::Novice).await.unwrap();

        ledger
            .transfer(
                a.clone(),
                b.clone(),
                Money::from_apx(30),
                TransactionKind::Transfer,
                None,
            )
            .await
            .unwrap();

        assert_eq!(ledger.get_balance(&a).await.unwrap(), Money::from_apx(70));
        assert_eq!(ledger.get_balance(&b).await.unwrap(), Money::from_apx(130));
    }

    #[tokio::test]
    async fn transfer_exceeding_debt_ceiling_is_rejected_without_state_change() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::bootstrap(test_config(dir.path().to_path_buf()))
            .await
            .unwrap();

        let a = AgentId::new("a").unwrap();
        let b = AgentId::new("b").unwrap();
        ledger.create_agent(a.clone(), Tier::Novice).await.unwrap();
        ledger.create_agent(b.clone(), Tier::Novice).await.unwrap();

        let before = ledger.get_balance(&a).await.unwrap();
        let result = ledger
            .transfer(
                a.clone(),
                b,
                Money::from_apx(201),
                TransactionKind::Transfer,
                None,
            )
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds)));
        assert_eq!(ledger.get_balance(&a).await.unwrap(), before);
    }

    #[tokio::test]
    async fn performance_update_never_touches_balance() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::bootstrap(test_config(dir.path().to_path_buf()))
            .await
            .unwrap();

        let a = AgentId::new("a").unwrap();
        ledger.create_agent(a.clone(), Tier::Novice).await.unwrap();
        let before = ledger.get_balance(&a).await.unwrap();

        ledger
            .apply_performance_update(&a, 1, None, None, None)
            .await
            .unwrap();

        assert_eq!(ledger.get_balance(&a).await.unwrap(), before);
        assert_eq!(ledger.get_agent(&a).await.unwrap().performance.streak, 1);
    }

    #[tokio::test]
    async fn second_bootstrap_fails_while_first_holds_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let _first = Ledger::bootstrap(test_config(dir.path().to_path_buf()))
            .await
            .unwrap();

        let result = Ledger::bootstrap(test_config(dir.path().to_path_buf())).await;
        assert!(matches!(result, Err(LedgerError::LockHeld)));
    }

    #[tokio::test]
    async fn checkpoint_then_restart_recovers_same_balances() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());

        {
            let ledger = Ledger::bootstrap(config.clone()).await.unwrap();
            let a = AgentId::new("a").unwrap();
            ledger.create_agent(a, Tier::Novice).await.unwrap();
            ledger.checkpoint().await.unwrap();
        }

        let ledger = Ledger::bootstrap(config).await.unwrap();
        let a = AgentId::new("a").unwrap();
        assert_eq!(ledger.get_balance(&a).await.unwrap(), Money::from_apx(100));
    }
}
