//! Scoped per-run workspace directory.
//!
//! Every run writes its artifacts into its own directory
//! `<parent>/hri_<run_id>`, so concurrent runs never share names. The
//! guard releases intermediates when it is dropped, on success and on
//! every error path alike; artifacts marked with [`RunWorkspace::retain`]
//! survive.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GeoprocessingError, Result};

/// What happens to workspace contents when the guard is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Delete everything except retained artifacts.
    #[default]
    RemoveIntermediates,
    /// Leave the workspace untouched.
    RetainAll,
}

impl CleanupPolicy {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "retain" | "retain_all" | "keep" => Self::RetainAll,
            _ => Self::RemoveIntermediates,
        }
    }
}

/// Guard over one run's workspace directory.
#[derive(Debug)]
pub struct RunWorkspace {
    root: PathBuf,
    run_id: String,
    policy: CleanupPolicy,
    overwrite: bool,
    retained: HashSet<PathBuf>,
}

impl RunWorkspace {
    /// Create `<parent>/hri_<run_id>`.
    ///
    /// An existing directory is an error unless `overwrite` is set, in which
    /// case it is cleared first.
    pub fn create(parent: &Path, run_id: &str, policy: CleanupPolicy, overwrite: bool) -> Result<Self> {
        let root = parent.join(format!("hri_{}", run_id));

        if root.exists() {
            if !overwrite {
                return Err(GeoprocessingError::ArtifactExists(root.display().to_string()));
            }
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;

        debug!(path = %root.display(), ?policy, "Created run workspace");

        Ok(Self {
            root,
            run_id: run_id.to_string(),
            policy,
            overwrite,
            retained: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Path for a named artifact, freeing the name if overwriting is allowed.
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        if path.exists() {
            if !self.overwrite {
                return Err(GeoprocessingError::ArtifactExists(path.display().to_string()));
            }
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(path)
    }

    /// Keep an artifact when intermediates are released.
    pub fn retain(&mut self, path: impl Into<PathBuf>) {
        self.retained.insert(path.into());
    }

    fn release(&self) -> std::io::Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if self.retained.contains(&path) {
                continue;
            }
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        if self.retained.is_empty() {
            fs::remove_dir(&self.root)?;
        }
        Ok(())
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        if self.policy == CleanupPolicy::RetainAll {
            return;
        }
        match self.release() {
            Ok(()) => debug!(
                path = %self.root.display(),
                retained = self.retained.len(),
                "Released run workspace"
            ),
            Err(e) => warn!(path = %self.root.display(), error = %e, "Failed to release run workspace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_keeps_retained() {
        let parent = tempfile::tempdir().unwrap();
        let final_path;
        let scratch;
        {
            let mut ws = RunWorkspace::create(parent.path(), "a", CleanupPolicy::RemoveIntermediates, false).unwrap();
            scratch = ws.artifact_path("land_cover").unwrap();
            fs::create_dir_all(&scratch).unwrap();
            final_path = ws.artifact_path("HRI_Spatial_Bins.geojson").unwrap();
            fs::write(&final_path, "{}").unwrap();
            ws.retain(final_path.clone());
        }
        assert!(final_path.exists());
        assert!(!scratch.exists());
    }

    #[test]
    fn test_release_without_retained_removes_root() {
        let parent = tempfile::tempdir().unwrap();
        let root = {
            let ws = RunWorkspace::create(parent.path(), "b", CleanupPolicy::RemoveIntermediates, false).unwrap();
            fs::write(ws.artifact_path("tmp").unwrap(), "x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn test_retain_all() {
        let parent = tempfile::tempdir().unwrap();
        let root = {
            let ws = RunWorkspace::create(parent.path(), "c", CleanupPolicy::RetainAll, false).unwrap();
            fs::write(ws.artifact_path("tmp").unwrap(), "x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(root.join("tmp").exists());
    }

    #[test]
    fn test_overwrite_flag() {
        let parent = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(parent.path(), "d", CleanupPolicy::RetainAll, false).unwrap();
        fs::write(ws.artifact_path("tmp").unwrap(), "x").unwrap();
        assert!(matches!(
            ws.artifact_path("tmp"),
            Err(GeoprocessingError::ArtifactExists(_))
        ));
        assert!(RunWorkspace::create(parent.path(), "d", CleanupPolicy::RetainAll, false).is_err());

        let again = RunWorkspace::create(parent.path(), "d", CleanupPolicy::RetainAll, true).unwrap();
        assert!(!again.path().join("tmp").exists());
    }
}
