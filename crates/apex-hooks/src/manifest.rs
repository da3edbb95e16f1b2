use std::collections::HashSet;
use std::path::Path;

use crate::descriptor::HookDescriptor;
use crate::error::HookError;

/// The parsed hook manifest file: a JSON array of [`HookDescriptor`].
/// Loaded once at startup; immutable for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct HookManifest {
    descriptors: Vec<HookDescriptor>,
}

impl HookManifest {
    /// Validates that `(phase, id)` pairs are unique before accepting the
    /// manifest — two descriptors sharing an id within a phase would make
    /// ordering ambiguous.
    pub fn new(descriptors: Vec<HookDescriptor>) -> Result<Self, HookError> {
        let mut seen = HashSet::new();
        for d in &descriptors {
            let key = (d.phase, d.id.clone());
            if !seen.insert(key) {
                return Err(HookError::Manifest(format!(
                    "duplicate hook id '{}' in phase {:?}",
                    d.id, d.phase
                )));
            }
        }
        Ok(HookManifest { descriptors })
    }

    pub async fn load_from_file(path: &Path) -> Result<Self, HookError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HookError::Manifest(format!("reading {}: {e}", path.display())))?;
        let descriptors: Vec<HookDescriptor> = serde_json::from_slice(&bytes)
            .map_err(|e| HookError::Manifest(format!("parsing {}: {e}", path.display())))?;
        Self::new(descriptors)
    }

    pub fn descriptors(&self) -> &[HookDescriptor] {
        &self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::HookPhase;
    use std::collections::HashSet as Set;

    fn descriptor(id: &str, phase: HookPhase, priority: i32) -> HookDescriptor {
        HookDescriptor {
            id: id.to_string(),
            phase,
            priority,
            triggers: Set::from(["*".to_string()]),
            critical: false,
            config: serde_json::Value::Null,
        }
    }

    #[test]
    fn rejects_duplicate_id_within_a_phase() {
        let result = HookManifest::new(vec![
            descriptor("a", HookPhase::PreTool, 0),
            descriptor("a", HookPhase::PreTool, 1),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn allows_same_id_across_different_phases() {
        let result = HookManifest::new(vec![
            descriptor("a", HookPhase::PreTool, 0),
            descriptor("a", HookPhase::PostTool, 0),
        ]);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn loads_and_parses_a_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hooks.json");
        tokio::fs::write(
            &path,
            serde_json::to_vec(&vec![descriptor("static_analysis", HookPhase::PreTool, 10)])
                .unwrap(),
        )
        .await
        .unwrap();

        let manifest = HookManifest::load_from_file(&path).await.unwrap();
        assert_eq!(manifest.descriptors().len(), 1);
    }
}
