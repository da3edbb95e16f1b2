use async_trait::async_trait;

use crate::context::HookContext;
use crate::error::HookError;
use crate::payload::HookPayload;
use crate::traits::Hook;

/// PRE_PROMPT: passthrough slot for semantic-memory context injection.
/// Vector/semantic memory is an external collaborator exposing an
/// `add`/`search` interface that lives outside this core; this core only
/// routes, meters, and persists the events around it, so this hook
/// currently does nothing but keeps the phase non-empty and gives a
/// future memory integration a well-ordered slot to occupy.
pub struct MemoryContextHook;

#[async_trait]
impl Hook for MemoryContextHook {
    fn id(&self) -> &str {
        "memory_context"
    }

    async fn run(&self, _payload: &mut HookPayload, _ctx: &HookContext) -> Result<(), HookError> {
        Ok(())
    }
}
