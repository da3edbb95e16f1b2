use async_trait::async_trait;

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::HookPayload;
use crate::traits::Hook;

/// PRE_TOOL: estimates the token/resource cost of a tool call from its
/// arguments and attaches it to the payload for the pricing-facing stages
/// (the handler's compensation calculation, the POST_TOOL tax hook). A
/// rough heuristic — 4 characters per token — stands in for a real
/// tokenizer, since the tokenizer itself lives with the out-of-scope LLM
/// collaborator.
pub struct ResourceMeteringHook {
    pub max_estimated_tokens: u64,
}

impl Default for ResourceMeteringHook {
    fn default() -> Self {
        ResourceMeteringHook {
            max_estimated_tokens: 32_000,
        }
    }
}

fn estimate_tokens(value: &serde_json::Value) -> u64 {
    let rendered = value.to_string();
    (rendered.len() as u64 / 4).max(1)
}

#[async_trait]
impl Hook for ResourceMeteringHook {
    fn id(&self) -> &str {
        "resource_metering"
    }

    async fn run(&self, payload: &mut HookPayload, _ctx: &HookContext) -> Result<(), HookError> {
        let tokens = payload
            .params
            .get("arguments")
            .map(estimate_tokens)
            .unwrap_or(0);

        payload.estimated_tokens = Some(tokens);
        payload.annotate("estimated_tokens", serde_json::json!(tokens));

        if tokens > self.max_estimated_tokens {
            return Err(HookError::Failed(
                self.id().to_string(),
                format!("estimated {tokens} tokens exceeds budget {}", self.max_estimated_tokens),
            ));
        }
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
    async fn estimates_tokens_from_arguments() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(
            RequestId::Number(1),
            "tools/call",
            serde_json::json!({"arguments": {"code": "x".repeat(40)}}),
        );
        ResourceMeteringHook::default().run(&mut payload, &ctx).await.unwrap();
        assert!(payload.estimated_tokens.unwrap() >= 10);
    }

    #[tokio::test]
    async fn rejects_estimate_over_budget() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(
            RequestId::Number(1),
            "tools/call",
            serde_json::json!({"arguments": {"code": "x".repeat(1_000)}}),
        );
        let hook = ResourceMeteringHook { max_estimated_tokens: 10 };
        assert!(hook.run(&mut payload, &ctx).await.is_err());
    }
}
