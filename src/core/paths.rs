// src/core/paths.rs

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{DOT_REGOLITH_DIR, USER_CACHE_DIR};

// 16 bytes = 32 hex characters
const HASH_TRUNCATE_LENGTH: usize = 16;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find the system cache directory.")]
    CacheDirNotFound,
    #[error("Could not create cache directory at '{path}': {source}")]
    CacheDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the root of the per-user regolith cache (`<os-cache-dir>/regolith`),
/// creating it if necessary.
pub fn user_cache_root() -> Result<PathBuf, PathError> {
    let root = dirs::cache_dir()
        .ok_or(PathError::CacheDirNotFound)?
        .join(USER_CACHE_DIR);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| PathError::CacheDirCreation {
            path: root.display().to_string(),
            source: e,
        })?;
    }
    Ok(root)
}

/// Returns the cache root for a project: `.regolith` under the project root,
/// or a per-project directory inside the user cache when `user_cache` is set.
///
/// The user-cache entry is keyed by a truncated blake3 hash of the canonical
/// project path, so the same project always resolves to the same directory.
pub fn project_cache_root(user_cache: bool, project_root: &Path) -> Result<PathBuf, PathError> {
    if !user_cache {
        return Ok(project_root.join(DOT_REGOLITH_DIR));
    }
    Ok(user_cache_root()?.join(project_cache_key(project_root)))
}

/// Derives the stable user-cache key for a project.
pub fn project_cache_key(project_root: &Path) -> String {
    let canonical = dunce::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    let hash = blake3::hash(canonical.to_string_lossy().as_bytes());
    hex::encode(&hash.as_bytes()[..HASH_TRUNCATE_LENGTH])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_cache_root_lives_under_the_project() {
        let project = TempDir::new().unwrap();
        let root = project_cache_root(false, project.path()).unwrap();
        assert_eq!(root, project.path().join(DOT_REGOLITH_DIR));
    }

    #[test]
    fn cache_key_is_stable_for_the_same_project() {
        let project = TempDir::new().unwrap();
        let a = project_cache_key(project.path());
        let b = project_cache_key(project.path());
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);

        let other = TempDir::new().unwrap();
        assert_ne!(a, project_cache_key(other.path()));
    }
}
