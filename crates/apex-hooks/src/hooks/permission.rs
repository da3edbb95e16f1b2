use async_trait::async_trait;

use apex_pricing::{tier_allows, Complexity};

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::{HookPayload, Violation, ViolationKind};
use crate::traits::Hook;

fn parse_complexity(value: &serde_json::Value) -> Complexity {
    match value.get("complexity").and_then(|c| c.as_str()) {
        Some("medium") => Complexity::Medium,
        Some("complex") => Complexity::Complex,
        Some("expert") => Complexity::Expert,
        _ => Complexity::Simple,
    }
}

/// PRE_TOOL: checks the calling agent's tier against the tool's declared
/// complexity via [`tier_allows`]; a tool above the agent's ceiling halts
/// the pipeline rather than running at a price the agent isn't cleared for.
pub struct PermissionHook;

#[async_trait]
impl Hook for PermissionHook {
    fn id(&self) -> &str {
        "permission"
    }

    async fn run(&self, payload: &mut HookPayload, ctx: &HookContext) -> Result<(), HookError> {
        let Some(agent_id) = payload.agent_id.clone() else {
            return Ok(());
        };

        let record = ctx.ledger.get_agent(&agent_id).await.map_err(|e| {
            HookError::Failed(self.id().to_string(), format!("agent lookup failed: {e}"))
        })?;

        let complexity = parse_complexity(&payload.params);
        if !tier_allows(record.metadata.tier, complexity.level()) {
            payload.halt = true;
            payload.push_violation(Violation::new(
                self.id(),
                ViolationKind::PermissionDenied,
                format!(
                    "tier {:?} may not attempt complexity level {}",
                    record.metadata.tier,
                    complexity.level()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_ledger::{Ledger, LedgerConfig};
    use apex_types::{AgentId, Money, RequestId, Tier};

    async fn ctx_with_agent(tier: Tier) -> (HookContext, AgentId) {
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
        let agent = AgentId::new("a").unwrap();
        ledger.create_agent(agent.clone(), tier).await.unwrap();
        (HookContext::new(std::sync::Arc::new(ledger), 0.01), agent)
    }

    #[tokio::test]
    async fn novice_is_blocked_from_expert_complexity() {
        let (ctx, agent) = ctx_with_agent(Tier::Novice).await;
        let mut payload = HookPayload::new(
            RequestId::Number(1),
            "tools/call",
            serde_json::json!({"complexity": "expert"}),
        );
        payload.agent_id = Some(agent);
        PermissionHook.run(&mut payload, &ctx).await.unwrap();
        assert!(payload.halt);
    }

    #[tokio::test]
    async fn master_is_allowed_expert_complexity() {
        let (ctx, agent) = ctx_with_agent(Tier::Master).await;
        let mut payload = HookPayload::new(
            RequestId::Number(1),
            "tools/call",
            serde_json::json!({"complexity": "expert"}),
        );
        payload.agent_id = Some(agent);
        PermissionHook.run(&mut payload, &ctx).await.unwrap();
        assert!(!payload.halt);
    }
}
