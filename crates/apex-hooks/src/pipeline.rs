use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::context::HookContext;
use crate::descriptor::{order_key, HookDescriptor, HookPhase};
use crate::error::HookError;
use crate::manifest::HookManifest;
use crate::payload::{HookPayload, Violation, ViolationKind};
use crate::traits::Hook;

/// Per-hook time budget; exceeding it is reported as a `hook_timeout`
/// violation rather than hanging the request.
const DEFAULT_HOOK_BUDGET: Duration = Duration::from_millis(500);

/// Outcome of running one phase's hooks over a payload.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every hook ran; the tool (or next phase) may proceed. Carries the
    /// mutated payload and any non-critical violations collected along the
    /// way.
    Continue(HookPayload),
    /// A hook set `halt = true`, or a critical hook failed. The caller must
    /// translate this into an error response and must not let the tool run
    /// or commit any ledger mutation beyond an audit record.
    Halt(HookPayload),
}

struct Registration {
    descriptor: HookDescriptor,
    hook: Arc<dyn Hook>,
}

/// The ordered, phase-separated interceptor pipeline (the "hypervisor").
/// Built once at startup from a [`HookManifest`] plus a registry of concrete
/// [`Hook`] implementations keyed by manifest id; immutable thereafter.
pub struct Pipeline {
    registrations: Vec<Registration>,
    hook_budget: Duration,
}

impl Pipeline {
    /// Binds every manifest descriptor to its concrete hook implementation.
    /// A descriptor naming an id with no matching hook is a startup error:
    /// the manifest is supposed to describe exactly the hooks compiled into
    /// this binary.
    pub fn new(
        manifest: &HookManifest,
        hooks: HashMap<String, Arc<dyn Hook>>,
    ) -> Result<Self, HookError> {
        let mut registrations = Vec::new();
        for descriptor in manifest.descriptors() {
            let hook = hooks.get(&descriptor.id).cloned().ok_or_else(|| {
                HookError::Manifest(format!(
                    "manifest references unknown hook id '{}'",
                    descriptor.id
                ))
            })?;
            registrations.push(Registration {
                descriptor: descriptor.clone(),
                hook,
            });
        }
        Ok(Pipeline {
            registrations,
            hook_budget: DEFAULT_HOOK_BUDGET,
        })
    }

    pub fn with_hook_budget(mut self, budget: Duration) -> Self {
        self.hook_budget = budget;
        self
    }

    /// Selects, sorts, and runs every hook registered for `phase` that
    /// triggers on `method`, in ascending-priority/id order, against
    /// `payload`.
    pub async fn run(
        &self,
        phase: HookPhase,
        mut payload: HookPayload,
        ctx: &HookContext,
    ) -> PipelineOutcome {
        let method = payload.method.clone();
        let mut selected: Vec<&Registration> = self
            .registrations
            .iter()
            .filter(|r| r.descriptor.phase == phase && r.descriptor.matches(&method))
            .collect();
        selected.sort_by_key(|r| order_key(&r.descriptor));

        for registration in selected {
            let descriptor = &registration.descriptor;
            let outcome = tokio::time::timeout(
                self.hook_budget,
                registration.hook.run(&mut payload, ctx),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    let violation = Violation::new(
                        descriptor.id.clone(),
                        classify(&err),
                        err.to_string(),
                    );
                    warn!(hook_id = %descriptor.id, critical = descriptor.critical, error = %err, "hook raised a violation");
                    payload.push_violation(violation);
                    if descriptor.critical {
                        payload.halt = true;
                    }
                }
                Err(_elapsed) => {
                    let violation = Violation::new(
                        descriptor.id.clone(),
                        ViolationKind::HookTimeout,
                        format!("exceeded {:?} budget", self.hook_budget),
                    );
                    warn!(hook_id = %descriptor.id, "hook timed out");
                    payload.push_violation(violation);
                    if descriptor.critical {
                        payload.halt = true;
                    }
                }
            }

            // Downstream hooks still run in audit-only mode after a halt,
            // but once halted we no longer let a hook flip it back to false.
        }

        if payload.halt {
            PipelineOutcome::Halt(payload)
        } else {
            PipelineOutcome::Continue(payload)
        }
    }
}

fn classify(err: &HookError) -> ViolationKind {
    match err {
        HookError::Timeout(_) => ViolationKind::HookTimeout,
        HookError::Failed(_, _) => ViolationKind::SecurityViolation,
        HookError::Manifest(_) => ViolationKind::ResourceExceeded,
    }
}
