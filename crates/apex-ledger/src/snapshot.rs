use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use apex_types::{AgentId, AgentRecord, TxId};
use std::collections::HashMap;

use crate::error::LedgerError;
use crate::state::{LedgerMetadata, LedgerState, SystemBank};

/// On-disk form of `ledger.snapshot.json`. Carries the full transaction log
/// (a superset of the named fields in the external interface) so that
/// duplicate-tx-id and monotonic-time checks remain correct across a
/// restart without needing to replay every WAL ever written.
#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub metadata: LedgerMetadata,
    pub system_bank: SystemBank,
    pub agents: HashMap<AgentId, AgentRecord>,
    pub last_tx_id: Option<TxId>,
    pub last_checkpoint_hash: String,
    pub transaction_log: Vec<apex_types::Transaction>,
}

impl LedgerSnapshot {
    fn from_state(state: &LedgerState) -> Self {
        let last_tx_id = state.last_tx_id();
        let mut metadata = state.metadata.clone();
        let hash = checkpoint_hash(state);
        metadata.last_checkpoint_hash = Some(hash.clone());
        LedgerSnapshot {
            metadata,
            system_bank: state.system_bank.clone(),
            agents: state.agents.clone(),
            last_tx_id,
            last_checkpoint_hash: hash,
            transaction_log: state.transaction_log.clone(),
        }
    }

    fn into_state(self) -> LedgerState {
        LedgerState {
            metadata: self.metadata,
            system_bank: self.system_bank,
            agents: self.agents,
            transaction_log: self.transaction_log,
        }
    }
}

fn checkpoint_hash(state: &LedgerState) -> String {
    let value = serde_json::json!({
        "system_bank": state.system_bank,
        "agents": state.agents,
        "last_tx_id": state.last_tx_id(),
    });
    let sorted = apex_types::canonical::sort_keys(value).expect("state always serializes");
    apex_types::canonical::sha256_hex(&sorted)
}

/// Atomically writes a snapshot: serialize to a temp file in the same
/// directory, force to the medium, then rename over the live path. The WAL
/// must only be truncated after this returns successfully.
pub async fn write_atomic(path: &Path, state: &LedgerState) -> Result<String, LedgerError> {
    let snapshot = LedgerSnapshot::from_state(state);
    let hash = snapshot.last_checkpoint_hash.clone();
    let bytes = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    let tmp_file = tokio::fs::File::open(&tmp_path)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;
    tmp_file
        .sync_all()
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    Ok(hash)
}

/// Loads the last snapshot, or a fresh empty state if none exists yet.
pub async fn load(
    path: &Path,
    initial_bank_balance: apex_types::Money,
) -> Result<LedgerState, LedgerError> {
    if !path.exists() {
        return Ok(LedgerState::new(initial_bank_balance));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;
    let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)
        .map_err(|e| LedgerError::SnapshotCorrupt(e.to_string()))?;

    let state = snapshot.into_state();
    let expected = checkpoint_hash(&state);
    if expected != state.metadata.last_checkpoint_hash.clone().unwrap_or_default() {
        return Err(LedgerError::SnapshotCorrupt(
            "checkpoint hash does not match snapshot contents".to_string(),
        ));
    }

    Ok(state)
}
