use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use apex_types::canonical::{sha256_hex, sort_keys};

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::HookPayload;
use crate::traits::Hook;

/// One persisted line of `audit.log`. Hash-chained the same way as this
/// monorepo family's append-only commitment ledger (`AppendOnlyLedger`):
/// every record's `entry_hash` covers its own fields plus the previous
/// record's hash, so a tampered or reordered audit.log is detectable without
/// needing a separate integrity file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditRecord {
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: String,
    pub method: String,
    pub agent_id: Option<String>,
    pub violations: Vec<String>,
    pub result_digest: String,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

fn compute_entry_hash(
    timestamp: chrono::DateTime<Utc>,
    request_id: &str,
    method: &str,
    agent_id: Option<&str>,
    violations: &[String],
    result_digest: &str,
    previous_hash: Option<&str>,
) -> String {
    let value = serde_json::json!({
        "timestamp": timestamp.to_rfc3339(),
        "request_id": request_id,
        "method": method,
        "agent_id": agent_id,
        "violations": violations,
        "result_digest": result_digest,
        "previous_hash": previous_hash,
    });
    let canonical = sort_keys(value).expect("audit record always serializes");
    sha256_hex(&canonical)
}

/// POST_TOOL (and, for halted requests, the dispatcher's audit-only pass):
/// writes one hash-chained NDJSON record to `audit.log` per request. Marked
/// `critical` in the manifest — losing an audit record must halt rather than
/// be silently swallowed.
pub struct AuditHook {
    path: PathBuf,
    previous_hash: Arc<Mutex<Option<String>>>,
}

impl AuditHook {
    /// Opens (or creates) `path` and seeds `previous_hash` from the last
    /// line already present, so the chain survives a restart.
    pub async fn open(path: PathBuf) -> Result<Self, HookError> {
        let previous_hash = Self::last_hash(&path)
            .await
            .map_err(|e| HookError::Failed("audit".into(), format!("reading {}: {e}", path.display())))?;
        Ok(AuditHook {
            path,
            previous_hash: Arc::new(Mutex::new(previous_hash)),
        })
    }

    async fn last_hash(path: &PathBuf) -> std::io::Result<Option<String>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        let file = tokio::fs::File::open(path).await?;
        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut last = None;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<AuditRecord>(&line) {
                last = Some(record.entry_hash);
            }
        }
        Ok(last)
    }
}

#[async_trait]
impl Hook for AuditHook {
    fn id(&self) -> &str {
        "audit"
    }

    async fn run(&self, payload: &mut HookPayload, _ctx: &HookContext) -> Result<(), HookError> {
        let timestamp = Utc::now();
        let request_id = payload.request_id.to_string();
        let agent_id = payload.agent_id.as_ref().map(|a| a.to_string());
        let violations: Vec<String> = payload
            .violations
            .iter()
            .map(|v| format!("{}:{:?}", v.hook_id, v.kind))
            .collect();
        let result_digest = payload
            .result
            .as_ref()
            .map(|r| sha256_hex(&sort_keys(r.clone()).unwrap_or(r.clone())))
            .unwrap_or_default();

        let mut previous_hash = self.previous_hash.lock().await;
        let entry_hash = compute_entry_hash(
            timestamp,
            &request_id,
            &payload.method,
            agent_id.as_deref(),
            &violations,
            &result_digest,
            previous_hash.as_deref(),
        );

        let record = AuditRecord {
            timestamp,
            request_id,
            method: payload.method.clone(),
            agent_id,
            violations,
            result_digest,
            previous_hash: previous_hash.clone(),
            entry_hash: entry_hash.clone(),
        };

        let line = serde_json::to_string(&record)
            .map_err(|e| HookError::Failed(self.id().to_string(), e.to_string()))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| HookError::Failed(self.id().to_string(), e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HookError::Failed(self.id().to_string(), e.to_string()))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| HookError::Failed(self.id().to_string(), e.to_string()))?;
        file.sync_data()
            .await
            .map_err(|e| HookError::Failed(self.id().to_string(), e.to_string()))?;

        *previous_hash = Some(entry_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_ledger::{Ledger, LedgerConfig};
    use apex_types::{Money, RequestId};

    async fn test_ctx() -> HookContext {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::bootstrap(LedgerConfig {
            root: dir.path().to_path_buf(),
            initial_bank_balance: Money::from_apx(1_000),
            initial_agent_balance: Money::from_apx(100),
            default_debt_ceiling: Money::from_apx(-100),
        })
        .await
        .unwrap();
        std::mem::forget(dir);
        HookContext::new(std::sync::Arc::new(ledger), 0.01)
    }

    #[tokio::test]
    async fn writes_one_chained_record_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let hook = AuditHook::open(path.clone()).await.unwrap();
        let ctx = test_ctx().await;

        let mut first = HookPayload::new(RequestId::Number(1), "tools/call", serde_json::json!({}));
        hook.run(&mut first, &ctx).await.unwrap();
        let mut second = HookPayload::new(RequestId::Number(2), "tools/call", serde_json::json!({}));
        hook.run(&mut second, &ctx).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first_record: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        let second_record: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first_record.previous_hash, None);
        assert_eq!(second_record.previous_hash, Some(first_record.entry_hash));
    }

    #[tokio::test]
    async fn chain_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let ctx = test_ctx().await;

        {
            let hook = AuditHook::open(path.clone()).await.unwrap();
            let mut payload = HookPayload::new(RequestId::Number(1), "tools/call", serde_json::json!({}));
            hook.run(&mut payload, &ctx).await.unwrap();
        }

        let hook = AuditHook::open(path.clone()).await.unwrap();
        let mut payload = HookPayload::new(RequestId::Number(2), "tools/call", serde_json::json!({}));
        hook.run(&mut payload, &ctx).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        let first_record: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        let second_record: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second_record.previous_hash, Some(first_record.entry_hash));
    }
}
