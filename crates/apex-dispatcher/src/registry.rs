use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use apex_types::{AgentId, RequestId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

/// Lifecycle state of a registered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Active,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

/// One request registry entry. `params_digest` lets `registry/listActive`
/// report enough to identify a request without echoing potentially
/// sensitive params verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub request_id: RequestId,
    pub method: String,
    pub params_digest: String,
    pub registered_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub agent_id: Option<AgentId>,
    pub task_id: Option<String>,
    #[serde(skip)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub cancel: Arc<Notify>,
}

fn digest(params: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(params).unwrap_or_default();
    let hash = Sha256::digest(&bytes);
    hex::encode(hash)
}

/// Small local hex encoder so the registry doesn't need to pull in the
/// general-purpose `hex` crate for one call site.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for b in bytes.as_ref() {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}

/// In-flight request table, owned by the dispatcher as its one logical
/// owner. The timeout sweeper and `registry/listActive` both read through
/// the same `RwLock`.
#[derive(Default)]
pub struct RequestRegistry {
    entries: RwLock<HashMap<RequestId, RegistryEntry>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        RequestRegistry {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(
        &self,
        request_id: RequestId,
        method: String,
        params: &serde_json::Value,
        agent_id: Option<AgentId>,
    ) -> Arc<Notify> {
        let cancel = Arc::new(Notify::new());
        let entry = RegistryEntry {
            request_id: request_id.clone(),
            method,
            params_digest: digest(params),
            registered_at: Utc::now(),
            status: RequestStatus::Active,
            agent_id,
            task_id: None,
            completed_at: None,
            cancel: cancel.clone(),
        };
        self.entries.write().await.insert(request_id, entry);
        cancel
    }

    pub async fn mark(&self, request_id: &RequestId, status: RequestStatus) {
        if let Some(entry) = self.entries.write().await.get_mut(request_id) {
            entry.status = status;
            if matches!(
                status,
                RequestStatus::Completed | RequestStatus::Failed | RequestStatus::TimedOut | RequestStatus::Cancelled
            ) {
                entry.completed_at = Some(Utc::now());
            }
        }
    }

    pub async fn cancel(&self, request_id: &RequestId) -> bool {
        let entries = self.entries.read().await;
        if let Some(entry) = entries.get(request_id) {
            if entry.status == RequestStatus::Active {
                entry.cancel.notify_waiters();
                drop(entries);
                self.mark(request_id, RequestStatus::Cancelled).await;
                return true;
            }
        }
        false
    }

    pub async fn list_active(&self) -> Vec<RegistryEntry> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.status == RequestStatus::Active)
            .cloned()
            .collect()
    }

    /// Marks every entry older than `ttl` as `timed_out` and returns their
    /// ids, so the caller can emit a timeout error response for each.
    pub async fn sweep_timeouts(&self, ttl: Duration) -> Vec<(RequestId, Arc<Notify>)> {
        let now = Utc::now();
        let mut timed_out = Vec::new();
        let mut entries = self.entries.write().await;
        for entry in entries.values_mut() {
            if entry.status != RequestStatus::Active {
                continue;
            }
            let age = now.signed_duration_since(entry.registered_at);
            if age.num_milliseconds() as u128 >= ttl.as_millis() {
                entry.status = RequestStatus::TimedOut;
                entry.completed_at = Some(now);
                warn!(request_id = %entry.request_id, method = %entry.method, "request timed out");
                timed_out.push((entry.request_id.clone(), entry.cancel.clone()));
            }
        }
        timed_out
    }

    /// Evicts every terminal entry whose `completed_at` is older than
    /// `retention`.
    pub async fn evict_stale(&self, retention: Duration) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| match entry.completed_at {
            Some(completed_at) => {
                now.signed_duration_since(completed_at).num_milliseconds() as u128
                    < retention.as_millis()
            }
            None => true,
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            info!(evicted, "evicted retained registry entries");
        }
    }
}
