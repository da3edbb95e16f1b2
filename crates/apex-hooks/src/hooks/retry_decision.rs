use async_trait::async_trait;

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::HookPayload;
use crate::traits::Hook;

/// Error strings a tool result may carry that indicate a transient,
/// retry-worth failure (as opposed to a deterministic rejection).
const TRANSIENT_MARKERS: &[&str] = &["timeout", "connection reset", "temporarily unavailable"];

/// POST_TOOL: annotates a tool result as retryable without itself
/// retrying — execution of the retry is the dispatcher's job.
pub struct RetryDecisionHook;

#[async_trait]
impl Hook for RetryDecisionHook {
    fn id(&self) -> &str {
        "retry_decision"
    }

    async fn run(&self, payload: &mut HookPayload, _ctx: &HookContext) -> Result<(), HookError> {
        if !payload.tool_ran {
            return Ok(());
        }
        let error_text = payload
            .result
            .as_ref()
            .and_then(|r| r.get("error"))
            .and_then(|e| e.as_str())
            .unwrap_or("");

        let lower = error_text.to_lowercase();
        payload.retryable = TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker));
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
    async fn marks_transient_errors_retryable() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(RequestId::Number(1), "tools/call", serde_json::json!({}));
        payload.tool_ran = true;
        payload.result = Some(serde_json::json!({"error": "Connection Reset by peer"}));

        RetryDecisionHook.run(&mut payload, &ctx).await.unwrap();
        assert!(payload.retryable);
    }

    #[tokio::test]
    async fn leaves_deterministic_errors_alone() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(RequestId::Number(1), "tools/call", serde_json::json!({}));
        payload.tool_ran = true;
        payload.result = Some(serde_json::json!({"error": "file not found"}));

        RetryDecisionHook.run(&mut payload, &ctx).await.unwrap();
        assert!(!payload.retryable);
    }

    #[tokio::test]
    async fn skips_when_tool_did_not_run() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(RequestId::Number(1), "tools/call", serde_json::json!({}));
        payload.result = Some(serde_json::json!({"error": "timeout"}));

        RetryDecisionHook.run(&mut payload, &ctx).await.unwrap();
        assert!(!payload.retryable);
    }
}
