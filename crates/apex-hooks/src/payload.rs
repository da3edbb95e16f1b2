use std::collections::HashMap;

use apex_types::{AgentId, Money, RequestId};
use serde::{Deserialize, Serialize};

/// The specific kind of hook failure, surfaced by the dispatcher as a
/// distinct wire error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    HookTimeout,
    SecurityViolation,
    StaticAnalysisCode,
    StaticAnalysisCommand,
    SandboxEscape,
    ResourceExceeded,
    FiscalInsolvency,
    PermissionDenied,
}

/// One recorded hook outcome: which hook raised it, what kind, and a short
/// human-readable reason. Non-critical hook exceptions are captured here
/// rather than aborting the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub hook_id: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(hook_id: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Violation {
            hook_id: hook_id.into(),
            kind,
            message: message.into(),
        }
    }
}

/// The mutable request payload threaded through every hook in a phase.
/// Hooks may transform `params`, stash data in `annotations` for downstream
/// hooks and the handler, and set `halt` to forbid the tool from running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    pub request_id: RequestId,
    pub method: String,
    pub agent_id: Option<AgentId>,
    pub params: serde_json::Value,
    #[serde(default)]
    pub annotations: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub halt: bool,
    #[serde(default)]
    pub violations: Vec<Violation>,
    /// Set by `ResourceMeteringHook`, read by pricing-facing hooks and the
    /// handler when it builds the compensation transaction.
    #[serde(default)]
    pub estimated_tokens: Option<u64>,
    /// Set once the tool has actually run; `POST_TOOL` hooks that depend on
    /// execution having occurred check this rather than re-deriving it.
    #[serde(default)]
    pub tool_ran: bool,
    /// The tool's raw result, populated by the dispatcher before POST_TOOL
    /// hooks run; `None` until then (and always `None` for non-tool
    /// methods).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Set by `RetryDecisionHook` when the result looks like a transient
    /// failure worth retrying; the dispatcher, not the hook, performs the
    /// retry.
    #[serde(default)]
    pub retryable: bool,
    /// Set by POST_TOOL hooks annotating fiscal effect, consumed by the
    /// handler's ledger transfer calls.
    #[serde(default)]
    pub computed_cost: Option<Money>,
}

impl HookPayload {
    pub fn new(request_id: RequestId, method: impl Into<String>, params: serde_json::Value) -> Self {
        HookPayload {
            request_id,
            method: method.into(),
            agent_id: None,
            params,
            annotations: HashMap::new(),
            halt: false,
            violations: Vec::new(),
            estimated_tokens: None,
            tool_ran: false,
            result: None,
            retryable: false,
            computed_cost: None,
        }
    }

    pub fn push_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.annotations.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_payload_starts_clean() {
        let payload = HookPayload::new(RequestId::Number(1), "tools/call", serde_json::json!({}));
        assert!(!payload.halt);
        assert!(payload.violations.is_empty());
    }

    #[test]
    fn push_violation_accumulates() {
        let mut payload = HookPayload::new(RequestId::Number(1), "tools/call", serde_json::json!({}));
        payload.push_violation(Violation::new("a", ViolationKind::SecurityViolation, "blocked import"));
        payload.push_violation(Violation::new("b", ViolationKind::ResourceExceeded, "too many tokens"));
        assert_eq!(payload.violations.len(), 2);
    }
}
