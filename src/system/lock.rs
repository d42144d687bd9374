//! # Session Lock
//!
//! Cross-process exclusive claim on a cache root. Every mutating command
//! acquires the lock before touching the cache or the workspace; a second
//! concurrent invocation fails fast with a contention error instead of
//! blocking. Release is guaranteed: dropping the guard removes the lock
//! file best-effort, and callers that want the release error call
//! [`SessionLock::release`] explicitly.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::constants::LOCK_FILENAME;

#[derive(Error, Debug)]
pub enum LockError {
    #[error(
        "Another instance is already working with this cache (lock file '{path}'{owner}).\n\
         If no other instance is running, delete the lock file and retry."
    )]
    Contended { path: String, owner: String },
    #[error("Could not create the lock file '{path}': {source}")]
    Acquire {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not remove the lock file '{path}': {source}")]
    Release {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An acquired session lock. Holds the claim until released or dropped.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    released: bool,
}

impl SessionLock {
    /// Claims the cache root. Fails immediately when another process holds
    /// the claim; never blocks.
    pub fn acquire(cache_root: &std::path::Path) -> Result<Self, LockError> {
        fs::create_dir_all(cache_root).map_err(|source| LockError::Acquire {
            path: cache_root.display().to_string(),
            source,
        })?;
        let path = cache_root.join(LOCK_FILENAME);
        let result = OpenOptions::new().write(true).create_new(true).open(&path);
        match result {
            Ok(mut file) => {
                // The owning PID is advisory, for the contention message.
                let _ = write!(file, "{}", std::process::id());
                Ok(Self {
                    path,
                    released: false,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let owner = match fs::read_to_string(&path) {
                    Ok(pid) if !pid.trim().is_empty() => format!(", held by PID {}", pid.trim()),
                    _ => String::new(),
                };
                Err(LockError::Contended {
                    path: path.display().to_string(),
                    owner,
                })
            }
            Err(source) => Err(LockError::Acquire {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Releases the claim, surfacing the removal error. Commands call this
    /// at the end of a successful body; on error paths the drop guard cleans
    /// up silently instead, so the substantive error stays primary.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|source| LockError::Release {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("Failed to remove the lock file '{}': {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquisition_fails_fast_with_contention() {
        let dir = TempDir::new().unwrap();
        let _held = SessionLock::acquire(dir.path()).unwrap();
        match SessionLock::acquire(dir.path()) {
            Err(LockError::Contended { owner, .. }) => {
                assert!(owner.contains(&std::process::id().to_string()));
            }
            other => panic!("expected contention, got {:?}", other),
        }
    }

    #[test]
    fn release_frees_the_claim_for_the_next_acquisition() {
        let dir = TempDir::new().unwrap();
        let lock = SessionLock::acquire(dir.path()).unwrap();
        lock.release().unwrap();
        SessionLock::acquire(dir.path()).unwrap();
    }

    #[test]
    fn dropping_the_guard_releases_on_error_paths() {
        let dir = TempDir::new().unwrap();
        {
            let _lock = SessionLock::acquire(dir.path()).unwrap();
        }
        assert!(!dir.path().join(LOCK_FILENAME).exists());
        SessionLock::acquire(dir.path()).unwrap();
    }
}
