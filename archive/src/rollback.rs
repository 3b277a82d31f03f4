//! Scoped removal of filesystem resources created by a pipeline stage.
//!
//! Only the stage that created a file or directory may delete it. A stage
//! wraps each resource it creates in a [`RollbackGuard`]; if the stage
//! returns early the guard removes the resource on drop, and once the
//! pipeline reaches a successful terminal state the guard is disarmed.

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Removes its path on drop unless [`disarm`](Self::disarm)ed.
///
/// Removal failures are logged and swallowed so that they never mask the
/// error that caused the rollback.
#[derive(Debug)]
#[must_use = "a guard that is dropped immediately rolls back at once"]
pub struct RollbackGuard {
    path: Option<PathBuf>,
}

impl RollbackGuard {
    /// Guard `path`, which the caller has just created.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A guard that owns nothing, for resources the caller did not create.
    pub fn none() -> Self {
        Self { path: None }
    }

    /// Return the guarded path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Keep the resource and return its path.
    pub fn disarm(mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            debug!("rolling back {}", path.display());
            remove_quietly(&path);
        }
    }
}

/// Remove a file or directory tree, logging instead of failing.
///
/// Returns true when something was removed.
pub fn remove_quietly(path: &Path) -> bool {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return false,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to remove {}: {err}", path.display());
            false
        }
    }
}
