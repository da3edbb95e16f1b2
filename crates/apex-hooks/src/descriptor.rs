use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The three points in a request's lifecycle at which hooks may intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookPhase {
    PrePrompt,
    PreTool,
    PostTool,
}

/// A trigger set of `"*"` matches every method; anything else is matched
/// literally against the dispatcher method name.
fn matches_trigger(triggers: &HashSet<String>, method: &str) -> bool {
    triggers.contains("*") || triggers.contains(method)
}

/// One entry of the hook manifest: `{ id, phase, priority, triggers,
/// critical?, config }`. Ordering within a phase is ascending `priority`,
/// ties broken by `id`. Loaded once at startup and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDescriptor {
    pub id: String,
    pub phase: HookPhase,
    pub priority: i32,
    pub triggers: HashSet<String>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl HookDescriptor {
    pub fn matches(&self, method: &str) -> bool {
        matches_trigger(&self.triggers, method)
    }
}

/// Total order for hooks within a single phase: ascending priority, ties
/// broken by the (arbitrary but stable) descriptor id.
pub fn order_key(descriptor: &HookDescriptor) -> (i32, String) {
    (descriptor.priority, descriptor.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, priority: i32, triggers: &[&str]) -> HookDescriptor {
        HookDescriptor {
            id: id.to_string(),
            phase: HookPhase::PreTool,
            priority,
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            critical: false,
            config: serde_json::Value::Null,
        }
    }

    #[test]
    fn wildcard_trigger_matches_any_method() {
        let d = descriptor("a", 0, &["*"]);
        assert!(d.matches("tools/call"));
        assert!(d.matches("anything"));
    }

    #[test]
    fn literal_trigger_matches_only_named_methods() {
        let d = descriptor("a", 0, &["tools/call"]);
        assert!(d.matches("tools/call"));
        assert!(!d.matches("ledger/transfer"));
    }

    #[test]
    fn order_key_sorts_by_priority_then_id() {
        let mut descriptors = vec![descriptor("b", 1, &["*"]), descriptor("a", 1, &["*"]), descriptor("z", 0, &["*"])];
        descriptors.sort_by_key(order_key);
        let ids: Vec<_> = descriptors.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }
}
