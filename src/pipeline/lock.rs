//! Per-instance deploy lock
//!
//! Concurrent pipeline runs against the same instance name are excluded by
//! a lock file in the state directory. The second run is refused outright:
//! there is no queueing and no mid-run cancellation, an in-flight run
//! always finishes its current stage.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from acquiring the deploy lock
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the lock for this instance
    #[error(
        "deploy lock for instance '{instance}' is held by pid {holder}; \
         refusing to start a concurrent run"
    )]
    Held { instance: String, holder: String },

    /// The lock file could not be created
    #[error("failed to create lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held for the duration of one pipeline run; released on drop
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    instance: String,
}

impl DeployLock {
    /// Acquires the lock for `instance`, creating the state directory as
    /// needed. Fails fast when the lock is already held.
    pub fn acquire(state_dir: &Path, instance: &str) -> Result<Self, LockError> {
        fs::create_dir_all(state_dir).map_err(|source| LockError::Io {
            path: state_dir.to_path_buf(),
            source,
        })?;

        let path = state_dir.join(format!("{}.lock", instance));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(LockError::Held {
                    instance: instance.to_string(),
                    holder,
                });
            }
            Err(source) => return Err(LockError::Io { path, source }),
        };

        // Recorded so a stale lock from a crashed run can be identified
        let _ = write!(file, "{}", std::process::id());
        debug!(instance, path = %path.display(), "Deploy lock acquired");

        Ok(Self {
            path,
            instance: instance.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(
                instance = %self.instance,
                path = %self.path.display(),
                error = %e,
                "Failed to release deploy lock"
            );
        } else {
            debug!(instance = %self.instance, "Deploy lock released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();

        let lock = DeployLock::acquire(dir.path(), "svc").unwrap();
        assert!(lock.path().exists());

        let path = lock.path().to_path_buf();
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_contention_is_refused() {
        let dir = TempDir::new().unwrap();

        let _held = DeployLock::acquire(dir.path(), "svc").unwrap();
        let err = DeployLock::acquire(dir.path(), "svc").unwrap_err();

        match err {
            LockError::Held { instance, holder } => {
                assert_eq!(instance, "svc");
                assert_eq!(holder, std::process::id().to_string());
            }
            other => panic!("expected Held, got {:?}", other),
        }
    }

    #[test]
    fn test_locks_are_keyed_by_instance_name() {
        let dir = TempDir::new().unwrap();

        let _svc = DeployLock::acquire(dir.path(), "svc").unwrap();
        // A different instance name deploys concurrently without conflict
        assert!(DeployLock::acquire(dir.path(), "other").is_ok());
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = TempDir::new().unwrap();

        drop(DeployLock::acquire(dir.path(), "svc").unwrap());
        assert!(DeployLock::acquire(dir.path(), "svc").is_ok());
    }

    #[test]
    fn test_creates_state_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("state/locks");

        let lock = DeployLock::acquire(&nested, "svc").unwrap();
        assert!(lock.path().starts_with(&nested));
    }
}
