// Handler for `regolith clean`.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::cli::args::CleanArgs;
use crate::cli::handlers::commons;
use crate::constants::{BUILD_DIR, DOT_REGOLITH_DIR};
use crate::core::paths;

pub fn handle(args: &CleanArgs) -> Result<()> {
    // Loading the config confirms this is actually a project before
    // anything is deleted.
    let (root, _config) = commons::load_project()?;

    remove_if_present(&root.join(DOT_REGOLITH_DIR), "project cache")?;
    remove_if_present(&root.join(BUILD_DIR), "build output")?;

    if args.user_cache {
        remove_if_present(&paths::user_cache_root()?, "user cache")?;
    } else {
        let entry = paths::user_cache_root()?.join(paths::project_cache_key(&root));
        remove_if_present(&entry, "user cache entry")?;
    }

    println!("{}", "Project cleaned.".green());
    Ok(())
}

fn remove_if_present(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path)
        .with_context(|| format!("Could not remove the {} '{}'.", what, path.display()))?;
    log::info!("Removed the {} '{}'.", what, path.display());
    Ok(())
}
