//! Built-in method handlers. Each handler takes the already hook-processed
//! request params and returns the JSON `result` value, or a
//! [`DispatcherError`] the caller turns into a wire error.

use std::sync::Arc;

use apex_ledger::Ledger;
use apex_pricing::{compensation, tier_allows, token_cost, Complexity};
use apex_types::{AgentId, Money, TransactionKind, TxId};
use serde::Deserialize;
use serde_json::Value;

use crate::error::DispatcherError;
use crate::registry::{RegistryEntry, RequestRegistry};
use crate::sandbox::ToolSandbox;

#[derive(Debug, Deserialize)]
struct GetAgentParams {
    id: String,
}

pub async fn ledger_get_agent(ledger: &Ledger, params: &Value) -> Result<Value, DispatcherError> {
    let parsed: GetAgentParams = serde_json::from_value(params.clone())
        .map_err(|e| DispatcherError::InvalidParams(e.to_string()))?;
    let id = AgentId::new(parsed.id).ok_or_else(|| DispatcherError::InvalidParams("id must not be empty".into()))?;
    let record = ledger.get_agent(&id).await?;
    Ok(serde_json::json!({
        "financials": record.financials,
        "performance": record.performance,
        "metadata": record.metadata,
    }))
}

#[derive(Debug, Deserialize)]
struct TransferParams {
    from: String,
    to: String,
    amount: i64,
    kind: TransactionKind,
    task_ref: Option<String>,
}

pub async fn ledger_transfer(ledger: &Ledger, params: &Value) -> Result<Value, DispatcherError> {
    let parsed: TransferParams = serde_json::from_value(params.clone())
        .map_err(|e| DispatcherError::InvalidParams(e.to_string()))?;
    let from = AgentId::new(parsed.from).ok_or_else(|| DispatcherError::InvalidParams("from must not be empty".into()))?;
    let to = AgentId::new(parsed.to).ok_or_else(|| DispatcherError::InvalidParams("to must not be empty".into()))?;
    let amount = Money::from_hundredths(parsed.amount);

    let tx_id = ledger
        .transfer(from, to, amount, parsed.kind, parsed.task_ref)
        .await?;
    Ok(serde_json::json!({ "tx_id": tx_id }))
}

pub async fn ledger_snapshot(ledger: &Ledger) -> Result<Value, DispatcherError> {
    let view = ledger.snapshot().await;
    serde_json::to_value(&view).map_err(|e| DispatcherError::Internal(e.to_string()))
}

pub async fn registry_list_active(registry: &RequestRegistry) -> Result<Value, DispatcherError> {
    let active: Vec<RegistryEntry> = registry.list_active().await;
    serde_json::to_value(&active).map_err(|e| DispatcherError::Internal(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    pub agent_id: String,
    #[serde(default)]
    pub complexity: Option<Complexity>,
}

pub fn parse_tool_call(params: &Value) -> Result<ToolCallParams, DispatcherError> {
    serde_json::from_value(params.clone()).map_err(|e| DispatcherError::InvalidParams(e.to_string()))
}

/// Runs the actual tool through the sandbox collaborator, then settles the
/// compensation and token-tax transfers against the ledger. PRE_TOOL/
/// POST_TOOL hooks have already run around this call; this function only
/// handles the sandbox invocation and the resulting fiscal effect.
pub async fn tools_call(
    ledger: &Ledger,
    sandbox: &Arc<dyn ToolSandbox>,
    call: &ToolCallParams,
    token_tax_rate: f64,
) -> Result<(Value, Money), DispatcherError> {
    let agent_id = AgentId::new(call.agent_id.clone())
        .ok_or_else(|| DispatcherError::InvalidParams("agent_id must not be empty".into()))?;
    let agent = ledger.get_agent(&agent_id).await?;

    let complexity = call.complexity.unwrap_or(Complexity::Simple);
    if !tier_allows(agent.metadata.tier, complexity.level()) {
        return Err(DispatcherError::PermissionDenied);
    }

    let outcome = sandbox
        .execute(&call.name, &call.arguments)
        .await
        .map_err(DispatcherError::Internal)?;

    let estimated_tokens = estimate_tokens(&call.arguments);
    let tax = token_cost(estimated_tokens, token_tax_rate);
    let reward = compensation(
        agent.metadata.base_rate,
        complexity,
        agent.performance.streak,
        tax,
        Money::ZERO,
    );

    if reward.is_positive() {
        ledger
            .transfer(
                AgentId::system_bank(),
                agent_id.clone(),
                reward,
                TransactionKind::Reward,
                Some(call.name.clone()),
            )
            .await?;
    }
    if tax.is_positive() {
        ledger
            .transfer(
                agent_id.clone(),
                AgentId::system_bank(),
                tax,
                TransactionKind::Tax,
                Some(TxId::new().to_string()),
            )
            .await?;
    }

    Ok((outcome.result, reward - tax))
}

fn estimate_tokens(arguments: &Value) -> u64 {
    let chars = arguments.to_string().len() as u64;
    (chars / 4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_ledger::LedgerConfig;
    use apex_types::Tier;
    use crate::sandbox::SimulatedSandbox;

    async fn test_ledger() -> Ledger {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::bootstrap(LedgerConfig {
            root: dir.path().to_path_buf(),
            initial_bank_balance: Money::from_apx(10_000),
            initial_agent_balance: Money::from_apx(100),
            default_debt_ceiling: Money::from_apx(-100),
        })
        .await
        .unwrap();
        std::mem::forget(dir);
        ledger
    }

    #[tokio::test]
    async fn get_agent_returns_financials_and_metadata() {
        let ledger = test_ledger().await;
        let id = AgentId::new("a").unwrap();
        ledger.create_agent(id.clone(), Tier::Novice).await.unwrap();

        let value = ledger_get_agent(&ledger, &serde_json::json!({"id": "a"})).await.unwrap();
        assert_eq!(value["financials"]["balance"], 10_000);
    }

    #[tokio::test]
    async fn get_agent_rejects_unknown_id() {
        let ledger = test_ledger().await;
        let result = ledger_get_agent(&ledger, &serde_json::json!({"id": "ghost"})).await;
        assert!(matches!(result, Err(DispatcherError::AgentNotFound)));
    }

    #[tokio::test]
    async fn transfer_moves_funds_between_agents() {
        let ledger = test_ledger().await;
        let a = AgentId::new("a").unwrap();
        let b = AgentId::new("b").unwrap();
        ledger.create_agent(a.clone(), Tier::Novice).await.unwrap();
        ledger.create_agent(b.clone(), Tier::Novice).await.unwrap();

        let value = ledger_transfer(
            &ledger,
            &serde_json::json!({"from": "a", "to": "b", "amount": 1000, "kind": "TRANSFER"}),
        )
        .await
        .unwrap();
        assert!(value.get("tx_id").is_some());
        assert_eq!(ledger.get_balance(&b).await.unwrap(), Money::from_apx(110));
    }

    #[tokio::test]
    async fn tools_call_rejects_complexity_above_tier() {
        let ledger = test_ledger().await;
        let a = AgentId::new("a").unwrap();
        ledger.create_agent(a.clone(), Tier::Novice).await.unwrap();
        let sandbox: Arc<dyn ToolSandbox> = Arc::new(SimulatedSandbox::new());

        let call = ToolCallParams {
            name: "noop".into(),
            arguments: serde_json::json!({}),
            agent_id: "a".into(),
            complexity: Some(Complexity::Expert),
        };
        let result = tools_call(&ledger, &sandbox, &call, 0.01).await;
        assert!(matches!(result, Err(DispatcherError::PermissionDenied)));
    }

    #[tokio::test]
    async fn tools_call_settles_reward_and_tax() {
        let ledger = test_ledger().await;
        let a = AgentId::new("a").unwrap();
        ledger.create_agent(a.clone(), Tier::Novice).await.unwrap();
        let sandbox: Arc<dyn ToolSandbox> = Arc::new(SimulatedSandbox::new());

        let call = ToolCallParams {
            name: "noop".into(),
            arguments: serde_json::json!({}),
            agent_id: "a".into(),
            complexity: None,
        };
        let before = ledger.get_balance(&a).await.unwrap();
        let (_result, net) = tools_call(&ledger, &sandbox, &call, 0.01).await.unwrap();
        let after = ledger.get_balance(&a).await.unwrap();
        assert_eq!(after.hundredths() - before.hundredths(), net.hundredths());
    }
}
