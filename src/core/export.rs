//! # Export
//!
//! Delivers the staged workspace to the profile's export target. The `local`
//! target copies packs to `build/RP` and `build/BP` under the project root;
//! the `exact` target copies to explicitly configured paths. The in-place
//! mode (used by `regolith tool`) overwrites the original source
//! directories with workspace output instead.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::constants::{BP_DIR, BUILD_DIR, DATA_DIR, RP_DIR};
use crate::core::filter::RunContext;
use crate::models::{Config, ExportMode, ExportTarget, Profile};

/// Exports the workspace packs to the profile's export target.
pub fn export_project(profile: &Profile, ctx: &RunContext<'_>) -> Result<()> {
    let (rp_target, bp_target) = resolve_targets(&profile.export, ctx)?;
    let workspace = ctx.workspace();

    deliver(&workspace.join(RP_DIR), &rp_target)
        .context("Failed to export the resource pack.")?;
    deliver(&workspace.join(BP_DIR), &bp_target)
        .context("Failed to export the behavior pack.")?;

    if profile.export.read_only {
        set_readonly_recursive(&rp_target)?;
        set_readonly_recursive(&bp_target)?;
    }
    Ok(())
}

/// Overwrites the original source directories with workspace output,
/// bypassing the destination concept entirely. Used by the single-filter
/// `tool` invocation; data is written back too since tool filters may
/// maintain their own files there.
pub fn export_in_place(config: &Config, ctx: &RunContext<'_>) -> Result<()> {
    let workspace = ctx.workspace();
    let pairs = [
        (RP_DIR, config.packs.resource_pack.as_str(), "resource pack"),
        (BP_DIR, config.packs.behavior_pack.as_str(), "behavior pack"),
        (DATA_DIR, config.regolith.data_path.as_str(), "data folder"),
    ];
    for (short_name, source, descriptive_name) in pairs {
        if source.is_empty() {
            continue;
        }
        let target = ctx.absolute_location.join(source);
        deliver(&workspace.join(short_name), &target)
            .with_context(|| format!("Failed to overwrite the {} in place.", descriptive_name))?;
    }
    Ok(())
}

fn resolve_targets(export: &ExportTarget, ctx: &RunContext<'_>) -> Result<(PathBuf, PathBuf)> {
    match export.target {
        ExportMode::Local => {
            let build = ctx.absolute_location.join(BUILD_DIR);
            Ok((build.join(RP_DIR), build.join(BP_DIR)))
        }
        ExportMode::Exact => {
            let (Some(rp), Some(bp)) = (&export.rp_path, &export.bp_path) else {
                bail!("The 'exact' export target requires both 'rpPath' and 'bpPath'.");
            };
            Ok((
                ctx.absolute_location.join(rp),
                ctx.absolute_location.join(bp),
            ))
        }
    }
}

/// Replaces the destination directory with the contents of `source`.
fn deliver(source: &Path, destination: &Path) -> Result<()> {
    if destination.exists() {
        // Exported files may have been made read-only by a previous run.
        clear_readonly_recursive(destination)?;
        fs::remove_dir_all(destination).with_context(|| {
            format!("Could not clear export destination '{}'.", destination.display())
        })?;
    }
    fs::create_dir_all(destination).with_context(|| {
        format!("Could not create export destination '{}'.", destination.display())
    })?;
    copy_dir_contents(source, destination)
}

/// Recursively copies the contents of `source` into `destination`.
/// `destination` must already exist.
pub(crate) fn copy_dir_contents(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.with_context(|| {
            format!("Failed to walk the directory '{}'.", source.display())
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .expect("walked entries are rooted at the source");
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_context(|| {
                format!("Could not create directory '{}'.", target.display())
            })?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Could not create directory '{}'.", parent.display())
                })?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Could not copy '{}' to '{}'.",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

fn set_readonly_recursive(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let mut perms = entry.metadata()?.permissions();
            perms.set_readonly(true);
            fs::set_permissions(entry.path(), perms).with_context(|| {
                format!("Could not mark '{}' read-only.", entry.path().display())
            })?;
        }
    }
    Ok(())
}

fn clear_readonly_recursive(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let mut perms = entry.metadata()?.permissions();
            if perms.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                perms.set_readonly(false);
                fs::set_permissions(entry.path(), perms).with_context(|| {
                    format!("Could not restore write access to '{}'.", entry.path().display())
                })?;
            }
        }
    }
    Ok(())
}
