//! Local working copy of the golden repository.
//!
//! [`WorkingCopy`] owns its directory: dropping it removes the clone, which
//! covers both the success and the failure path of a run. Paths are also
//! tracked in a [`CleanupRegistry`] so a signal handler can remove them when
//! the process is interrupted before the guard unwinds.

use crate::clone_url::CloneTarget;
use crate::error::{Result, SyncError};
use crate::git;
use crate::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CleanupRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: &Path) {
        if let Ok(mut paths) = self.paths.lock() {
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_path_buf());
            }
        }
    }

    pub fn deregister(&self, path: &Path) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.retain(|p| p != path);
        }
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Remove every registered directory. Used from the interrupt handler.
    pub fn cleanup_all(&self) {
        let paths = match self.paths.lock() {
            Ok(mut paths) => std::mem::take(&mut *paths),
            Err(_) => return,
        };
        for path in paths {
            if let Err(e) = io::remove_dir_if_exists(&path) {
                warn!(path = %path.display(), "failed to remove working copy: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WorkingCopy
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
    registry: CleanupRegistry,
}

impl WorkingCopy {
    /// Directory the repository is cloned into: `<workspace_dir>/<repo_name>`.
    pub fn dir_for(workspace_dir: &Path, repo_name: &str) -> PathBuf {
        workspace_dir.join(repo_name)
    }

    /// Clone `target` into a fresh directory, purging any leftover from an
    /// earlier run first. A failed clone leaves nothing behind.
    pub fn clone_into(
        workspace_dir: &Path,
        target: &CloneTarget,
        registry: &CleanupRegistry,
    ) -> Result<Self> {
        let path = Self::dir_for(workspace_dir, &target.repo_name);
        let direct_child = path.parent() == Some(workspace_dir)
            && path.file_name().is_some_and(|name| name == target.repo_name.as_str());
        if !direct_child {
            return Err(SyncError::invalid(
                "clone repository",
                format!(
                    "repository name '{}' does not resolve inside {}",
                    target.repo_name,
                    workspace_dir.display()
                ),
            ));
        }
        if io::remove_dir_if_exists(&path)? {
            info!(path = %path.display(), "removed stale working copy");
        }
        std::fs::create_dir_all(workspace_dir)?;

        registry.register(&path);
        let dest = path.to_string_lossy();
        if let Err(e) = git::run(None, &["clone", "--quiet", "--", &target.url, &dest]) {
            if let Err(cleanup) = io::remove_dir_if_exists(&path) {
                warn!(path = %path.display(), "failed to remove partial clone: {cleanup}");
            }
            registry.deregister(&path);
            return Err(e);
        }

        Ok(Self {
            path,
            registry: registry.clone(),
        })
    }

    /// Set the commit identity for this clone only.
    pub fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        git::run(Some(&self.path), &["config", "user.name", name])?;
        git::run(Some(&self.path), &["config", "user.email", email])?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        match io::remove_dir_if_exists(&self.path) {
            Ok(_) => info!(path = %self.path.display(), "removed working copy"),
            Err(e) => warn!(path = %self.path.display(), "failed to remove working copy: {e}"),
        }
        self.registry.deregister(&self.path);
    }
}
