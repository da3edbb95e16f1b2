use async_trait::async_trait;

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::HookPayload;
use crate::traits::Hook;

/// PRE_PROMPT: injects the calling agent's current balance, tier, and streak
/// into the outgoing prompt context so the LLM collaborator can reason about
/// affordability before proposing a tool call.
pub struct FiscalContextHook;

#[async_trait]
impl Hook for FiscalContextHook {
    fn id(&self) -> &str {
        "fiscal_context"
    }

    async fn run(&self, payload: &mut HookPayload, ctx: &HookContext) -> Result<(), HookError> {
        let Some(agent_id) = payload.agent_id.clone() else {
            return Ok(());
        };

        let record = ctx.ledger.get_agent(&agent_id).await.map_err(|e| {
            HookError::Failed("fiscal_context".into(), format!("agent lookup failed: {e}"))
        })?;

        payload.annotate(
            "fiscal_context",
            serde_json::json!({
                "balance": record.financials.balance.hundredths(),
                "tier": record.metadata.tier,
                "streak": record.performance.streak,
            }),
        );
        Ok(())
    }
}
