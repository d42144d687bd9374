// Shared helpers used by multiple handlers.

use anyhow::{Context, Result};
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};

use crate::core::{config_loader, paths, remote};
use crate::models::Config;
use crate::system::lock::SessionLock;

/// Resolves the project root: the current working directory, canonicalized.
pub fn project_root() -> Result<PathBuf> {
    let cwd = env::current_dir().context("Could not determine the current directory.")?;
    Ok(dunce::canonicalize(&cwd).unwrap_or(cwd))
}

/// Loads the project at the current directory.
pub fn load_project() -> Result<(PathBuf, Config)> {
    let root = project_root()?;
    let config = config_loader::load_config(&root)
        .context("Not a regolith project (or the configuration is unreadable).")?;
    Ok((root, config))
}

/// Resolves the cache root for this invocation. Setting
/// `REGOLITH_USER_CACHE` moves the cache out of the project tree into the
/// per-user cache directory, keyed by the project path.
pub fn cache_root(project_root: &Path) -> Result<PathBuf> {
    let user_cache = env::var_os("REGOLITH_USER_CACHE").is_some_and(|v| v != "0");
    Ok(paths::project_cache_root(user_cache, project_root)?)
}

/// Runs a command body under the session lock and subordinates the
/// lock-release error: it only surfaces when the body itself succeeded,
/// so a substantive pipeline failure stays the primary error.
pub fn finish_with_lock(result: Result<()>, lock: SessionLock) -> Result<()> {
    match result {
        Ok(()) => lock.release().context("Command succeeded but the session lock was not released cleanly."),
        // The drop guard removes the lock file best-effort.
        Err(e) => Err(e),
    }
}

/// Remote operations need git; its absence is only fatal once a download is
/// actually attempted.
pub fn warn_if_git_missing() {
    if !remote::has_git() {
        println!(
            "{}",
            "Warning: git was not found on PATH. Downloading remote filters will fail.".yellow()
        );
    }
}
