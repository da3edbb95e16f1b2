//! Tool sandbox — trait and simulated implementation.
//!
//! Real tool execution happens in an external sandbox (container)
//! collaborator, out of scope for this crate. `ToolSandbox` abstracts that
//! boundary so `tools/call` can be exercised end-to-end without one; the
//! `SimulatedSandbox` returns configurable canned results keyed by tool
//! name.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// The outcome of one tool invocation, before POST_TOOL hooks see it.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub result: Value,
    pub execution_time: Duration,
}

/// Executes an opaque named tool with the given arguments and returns its
/// raw result. Implementations must not themselves touch the ledger —
/// fiscal effects are the handler's responsibility once the sandbox
/// returns.
#[async_trait]
pub trait ToolSandbox: Send + Sync {
    async fn execute(&self, name: &str, arguments: &Value) -> Result<ToolOutcome, String>;
}

/// A simulated sandbox for local development and tests. `noop` always
/// succeeds with an empty result; any other name is echoed back as the
/// result unless it was preconfigured to fail.
pub struct SimulatedSandbox {
    failing_tools: HashMap<String, String>,
}

impl SimulatedSandbox {
    pub fn new() -> Self {
        SimulatedSandbox {
            failing_tools: HashMap::new(),
        }
    }

    pub fn with_failure(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failing_tools.insert(name.into(), reason.into());
        self
    }
}

impl Default for SimulatedSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolSandbox for SimulatedSandbox {
    async fn execute(&self, name: &str, arguments: &Value) -> Result<ToolOutcome, String> {
        if let Some(reason) = self.failing_tools.get(name) {
            return Err(reason.clone());
        }
        let result = match name {
            "noop" => serde_json::json!({}),
            _ => serde_json::json!({ "echo": arguments }),
        };
        Ok(ToolOutcome {
            result,
            execution_time: Duration::from_millis(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_tool_returns_empty_result() {
        let sandbox = SimulatedSandbox::new();
        let outcome = sandbox.execute("noop", &serde_json::json!({})).await.unwrap();
        assert_eq!(outcome.result, serde_json::json!({}));
    }

    #[tokio::test]
    async fn preconfigured_failure_is_returned_as_an_error() {
        let sandbox = SimulatedSandbox::new().with_failure("flaky_tool", "connection reset");
        let result = sandbox.execute("flaky_tool", &serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
