use async_trait::async_trait;

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::{HookPayload, Violation, ViolationKind};
use crate::traits::Hook;

/// Denylisted Python import/module names. Deliberately small and literal:
/// the point is deterministic, explainable rejection, not sandboxing
/// (sandboxed execution is the external Sandbox collaborator's job).
const BANNED_IMPORTS: &[&str] = &["os", "subprocess", "ctypes", "socket", "shutil"];

/// Denylisted shell command prefixes.
const BANNED_COMMANDS: &[&str] = &["rm -rf", "sudo", "curl ", "wget ", "dd if="];

/// PRE_TOOL: scans `tools/call` arguments for banned imports and shell
/// commands. A match halts the pipeline with a security violation rather
/// than letting the tool execute.
pub struct StaticAnalysisHook;

fn find_banned_import(code: &str) -> Option<&'static str> {
    BANNED_IMPORTS
        .iter()
        .find(|needle| code.contains(&format!("import {needle}")))
        .copied()
}

fn find_banned_command(command: &str) -> Option<&'static str> {
    BANNED_COMMANDS
        .iter()
        .find(|needle| command.contains(*needle))
        .copied()
}

#[async_trait]
impl Hook for StaticAnalysisHook {
    fn id(&self) -> &str {
        "static_analysis"
    }

    async fn run(&self, payload: &mut HookPayload, _ctx: &HookContext) -> Result<(), HookError> {
        let arguments = payload.params.get("arguments");

        if let Some(code) = arguments.and_then(|a| a.get("code")).and_then(|c| c.as_str()) {
            if let Some(banned) = find_banned_import(code) {
                payload.halt = true;
                payload.push_violation(Violation::new(
                    self.id(),
                    ViolationKind::StaticAnalysisCode,
                    format!("blocked import '{banned}'"),
                ));
                return Ok(());
            }
        }

        if let Some(command) = arguments.and_then(|a| a.get("command")).and_then(|c| c.as_str()) {
            if let Some(banned) = find_banned_command(command) {
                payload.halt = true;
                payload.push_violation(Violation::new(
                    self.id(),
                    ViolationKind::StaticAnalysisCommand,
                    format!("blocked command pattern '{banned}'"),
                ));
                return Ok(());
            }
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
    async fn blocks_banned_import() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(
            RequestId::Number(1),
            "tools/call",
            serde_json::json!({"arguments": {"code": "import os; os.system('ls /')"}}),
        );
        StaticAnalysisHook.run(&mut payload, &ctx).await.unwrap();
        assert!(payload.halt);
        assert_eq!(payload.violations[0].kind, ViolationKind::StaticAnalysisCode);
    }

    #[tokio::test]
    async fn blocks_banned_command() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(
            RequestId::Number(1),
            "tools/call",
            serde_json::json!({"arguments": {"command": "sudo rm -rf /"}}),
        );
        StaticAnalysisHook.run(&mut payload, &ctx).await.unwrap();
        assert!(payload.halt);
        assert_eq!(payload.violations[0].kind, ViolationKind::StaticAnalysisCommand);
    }

    #[tokio::test]
    async fn clean_code_passes() {
        let ctx = test_ctx().await;
        let mut payload = HookPayload::new(
            RequestId::Number(1),
            "tools/call",
            serde_json::json!({"arguments": {"code": "print('hello')"}}),
        );
        StaticAnalysisHook.run(&mut payload, &ctx).await.unwrap();
        assert!(!payload.halt);
        assert!(payload.violations.is_empty());
    }
}
