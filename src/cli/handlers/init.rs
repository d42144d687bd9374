// Handler for `regolith init`: scaffold a new project in the current
// directory.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::env;
use std::fs;
use std::path::Path;

use crate::cli::args::InitArgs;
use crate::cli::handlers::commons;
use crate::constants::{BP_DIR, DATA_DIR, DOT_REGOLITH_DIR, FILTER_CACHE_DIR, GITIGNORE, RP_DIR};
use crate::core::config_loader;
use crate::models::Config;

pub fn handle(args: &InitArgs) -> Result<()> {
    let root = commons::project_root()?;
    init_project(&root, args.force)?;
    println!("{}", "Initialized a new regolith project.".green());
    Ok(())
}

pub fn init_project(dir: &Path, force: bool) -> Result<()> {
    if !force && !is_empty_dir(dir)? {
        bail!("The current directory is not empty. Use --force to initialize anyway.");
    }

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    let author = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "Your name".to_string());

    config_loader::save_config(dir, &Config::new_for_init(&name, &author))?;
    fs::write(dir.join(".gitignore"), GITIGNORE)
        .context("Could not write the '.gitignore' file.")?;

    for subdir in [
        format!("packs/{}", RP_DIR),
        format!("packs/{}", BP_DIR),
        format!("packs/{}", DATA_DIR),
        format!("{}/{}", DOT_REGOLITH_DIR, FILTER_CACHE_DIR),
    ] {
        let path = dir.join(&subdir);
        fs::create_dir_all(&path)
            .with_context(|| format!("Could not create '{}'.", path.display()))?;
    }
    Ok(())
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Could not inspect the directory '{}'.", dir.display()))?;
    Ok(entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::RunContext;
    use crate::core::{paths, pipeline};
    use tempfile::TempDir;

    #[test]
    fn init_refuses_a_non_empty_directory_without_force() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("leftover.txt"), b"x").unwrap();
        assert!(init_project(dir.path(), false).is_err());
        init_project(dir.path(), true).unwrap();
    }

    #[test]
    fn a_fresh_project_runs_its_default_profile_immediately() {
        let dir = TempDir::new().unwrap();
        init_project(dir.path(), false).unwrap();

        let config = config_loader::load_config(dir.path()).unwrap();
        let cache_root = paths::project_cache_root(false, dir.path()).unwrap();
        let ctx = RunContext::new(
            &config,
            "default",
            dir.path().to_path_buf(),
            cache_root,
        );
        pipeline::run_profile(&ctx).unwrap();

        // The empty profile produces an empty export.
        assert!(dir.path().join("build/RP").is_dir());
        assert!(dir.path().join("build/BP").is_dir());
    }
}
