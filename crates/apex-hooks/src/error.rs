use thiserror::Error;

/// Failures a [`crate::traits::Hook`] implementation or the pipeline runner
/// itself may produce. A non-critical hook's error is captured as a
/// [`crate::payload::Violation`] and does not abort the pipeline; a critical
/// hook's error always halts.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook '{0}' exceeded its time budget")]
    Timeout(String),

    #[error("hook '{0}' failed: {1}")]
    Failed(String, String),

    #[error("manifest error: {0}")]
    Manifest(String),
}
