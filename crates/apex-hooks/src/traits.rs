use async_trait::async_trait;

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::HookPayload;

/// One interceptor in a phase's ordered pipeline, modeled directly on the
/// sequential, context-mutating stage contract used elsewhere in this
/// monorepo family for gated pipelines: each hook either lets the payload
/// through (possibly annotated) or raises a failure, and the surrounding
/// pipeline decides whether that failure halts.
///
/// `run` takes `&mut HookPayload` rather than returning a transformed copy,
/// so a hook can annotate or rewrite the payload in place instead of a
/// caller reassembling one from an allow/deny enum.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Stable identifier matched against the manifest's `id` field for
    /// ordering and lookup; hooks do not know their own priority/triggers,
    /// those live in the manifest so ordering is data, not code.
    fn id(&self) -> &str;

    async fn run(&self, payload: &mut HookPayload, ctx: &HookContext) -> Result<(), HookError>;
}
