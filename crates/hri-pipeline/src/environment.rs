//! Explicit engine environment replacing process-wide GIS settings.

use std::path::{Path, PathBuf};

use chrono::Utc;
use geoprocessing::{CleanupPolicy, RunWorkspace};
use tracing::info;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Where and how a run keeps its artifacts.
///
/// Each run acquires its own workspace directory, so concurrent runs never
/// share artifact names.
#[derive(Debug, Clone)]
pub struct EngineEnvironment {
    workspace_root: PathBuf,
    overwrite: bool,
    cleanup: CleanupPolicy,
}

impl EngineEnvironment {
    pub fn new(workspace_root: impl Into<PathBuf>, overwrite: bool, cleanup: CleanupPolicy) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            overwrite,
            cleanup,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let root = config
            .workspace_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Self::new(root, config.overwrite, config.cleanup)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn cleanup(&self) -> CleanupPolicy {
        self.cleanup
    }

    /// Acquire a fresh workspace for `run_id`. The returned guard releases
    /// it according to the cleanup policy when dropped.
    pub fn acquire(&self, run_id: &str) -> Result<RunWorkspace> {
        std::fs::create_dir_all(&self.workspace_root).map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot create workspace root {}: {}",
                self.workspace_root.display(),
                e
            ))
        })?;

        let workspace = RunWorkspace::create(&self.workspace_root, run_id, self.cleanup, self.overwrite)
            .map_err(|e| PipelineError::Configuration(format!("cannot acquire workspace: {}", e)))?;

        info!(
            run_id = %run_id,
            path = %workspace.path().display(),
            cleanup = ?self.cleanup,
            "Acquired run workspace"
        );
        Ok(workspace)
    }
}

/// Time-ordered, collision-free run identifier, e.g. `20230815T103000_1f0c9a2b`.
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%dT%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), "20230815T103000_1f0c9a2b".len());
    }

    #[test]
    fn test_acquire_creates_distinct_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        let env = EngineEnvironment::new(dir.path().join("runs"), false, CleanupPolicy::RetainAll);

        let first = env.acquire("one").unwrap();
        let second = env.acquire("two").unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(env.workspace_root()));

        // same id without overwrite collides
        assert!(matches!(env.acquire("one"), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_release_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let env = EngineEnvironment::new(dir.path(), true, CleanupPolicy::RemoveIntermediates);

        let path = {
            let workspace = env.acquire("scoped").unwrap();
            std::fs::write(workspace.path().join("scratch.bin"), b"x").unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
