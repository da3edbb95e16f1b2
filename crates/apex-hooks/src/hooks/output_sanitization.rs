use async_trait::async_trait;

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::HookPayload;
use crate::traits::Hook;

/// Fields a tool result must never carry back to the caller — internal
/// filesystem paths and other agents' balances, applying the same
/// no-sensitive-values rule to successful results that error payloads
/// already observe.
const DISALLOWED_FIELDS: &[&str] = &["internal_path", "other_agent_balance", "_debug"];

/// POST_TOOL: strips disallowed fields from the tool's result object before
/// it is handed back to the caller.
pub struct OutputSanitizationHook;

#[async_trait]
impl Hook for OutputSanitizationHook {
    fn id(&self) -> &str {
        "output_sanitization"
    }

    async fn run(&self, payload: &mut HookPayload, _ctx: &HookContext) -> Result<(), HookError> {
        if let Some(serde_json::Value::Object(map)) = payload.result.as_mut() {
            for field in DISALLOWED_FIELDS {
                map.remove(*field);
            }
        }
        Ok(())
    }
}
