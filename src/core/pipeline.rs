//! # Pipeline Executor
//!
//! Drives one profile invocation through four strictly ordered phases:
//! Check, Stage, Run, Export. No phase starts until the previous one
//! completed across the entire collection, so a later phase never leaves
//! partial side effects behind an earlier failure.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::constants::{BP_DIR, DATA_DIR, RP_DIR};
use crate::core::export;
use crate::core::filter::{FilterRunner, RunContext};
use crate::core::{collection, config_loader};
use crate::models::Config;

/// Runs a full profile invocation: resolve, check, stage, run, export.
/// This is the outermost entry; nested profiles go through their runners
/// and only check+run against the workspace staged here.
pub fn run_profile(ctx: &RunContext<'_>) -> Result<()> {
    let profile = config_loader::get_profile(ctx.config, &ctx.profile_name)?;
    let filters = collection::resolve_profile_filters(profile, ctx.config)?;

    check_collection(&filters, ctx)?;
    stage_workspace(ctx.config, ctx)?;
    run_collection(&filters, ctx)?;

    log::info!("Moving files to the target directory.");
    let start = Instant::now();
    export::export_project(profile, ctx)?;
    log::debug!("Export done in {:?}", start.elapsed());

    cleanup_transient_data(ctx)
}

/// Phase 1: validate prerequisites for every runner, in order. The disabled
/// flag skips execution, not validation, so disabled runners are checked too.
pub fn check_collection(filters: &[FilterRunner], ctx: &RunContext<'_>) -> Result<()> {
    for (index, runner) in filters.iter().enumerate() {
        runner.check(ctx).with_context(|| {
            let id = runner.id();
            if id.is_empty() {
                format!("Check failed for the filter at position {}.", index)
            } else {
                format!("Check failed for filter '{}' (position {}).", id, index)
            }
        })?;
    }
    Ok(())
}

/// Phase 3 (also used for remote sub-collections and nested profiles): run
/// every non-disabled runner in order. Returns whether any runner modified
/// the workspace.
pub fn run_collection(filters: &[FilterRunner], ctx: &RunContext<'_>) -> Result<bool> {
    let mut modified = false;
    for (index, runner) in filters.iter().enumerate() {
        if runner.is_disabled() {
            log::info!("Filter '{}' is disabled, skipping.", runner.id());
            continue;
        }
        // Containers (nested profiles) have an empty id; no step line for those.
        if !runner.id().is_empty() {
            log::info!("Running filter '{}'.", runner.id());
        }
        let start = Instant::now();
        let changed = runner.run(ctx).with_context(|| {
            let id = runner.id();
            if id.is_empty() {
                format!("Failed to run the filter at position {}.", index)
            } else {
                format!("Failed to run filter '{}'.", id)
            }
        })?;
        log::debug!("Executed in {:?}", start.elapsed());
        modified |= changed;
    }
    Ok(modified)
}

/// Phase 2: clear and recreate the scratch workspace, then copy the source
/// packs into subdirectories named for their roles. A missing source becomes
/// an empty placeholder (warned) so filters always see a consistent shape;
/// a source that exists but is not a directory fails the phase.
pub fn stage_workspace(config: &Config, ctx: &RunContext<'_>) -> Result<()> {
    let workspace = ctx.workspace();
    log::debug!("Cleaning workspace '{}'", workspace.display());
    if workspace.exists() {
        fs::remove_dir_all(&workspace).with_context(|| {
            format!("Unable to clean the workspace directory '{}'.", workspace.display())
        })?;
    }
    fs::create_dir_all(&workspace).with_context(|| {
        format!("Unable to prepare the workspace directory '{}'.", workspace.display())
    })?;

    let start = Instant::now();
    stage_source(ctx, &config.packs.resource_pack, RP_DIR, "Resource pack folder")?;
    stage_source(ctx, &config.packs.behavior_pack, BP_DIR, "Behavior pack folder")?;
    stage_source(ctx, &config.regolith.data_path, DATA_DIR, "Data folder")?;
    log::debug!("Staging done in {:?}", start.elapsed());
    Ok(())
}

fn stage_source(
    ctx: &RunContext<'_>,
    source: &str,
    short_name: &str,
    descriptive_name: &str,
) -> Result<()> {
    let destination = ctx.workspace().join(short_name);
    let create_placeholder = |destination: &Path| {
        fs::create_dir_all(destination).with_context(|| {
            format!("Failed to create the '{}' workspace directory.", short_name)
        })
    };

    if source.is_empty() {
        return create_placeholder(&destination);
    }
    let source_path = ctx.absolute_location.join(source);
    match fs::metadata(&source_path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("{} '{}' does not exist.", descriptive_name, source_path.display());
            create_placeholder(&destination)
        }
        Err(e) => Err(e).with_context(|| {
            format!("Failed to inspect {} '{}'.", descriptive_name, source_path.display())
        }),
        Ok(stats) if stats.is_dir() => {
            create_placeholder(&destination)?;
            export::copy_dir_contents(&source_path, &destination).with_context(|| {
                format!(
                    "Failed to copy {} '{}' into the workspace.",
                    descriptive_name,
                    source_path.display()
                )
            })
        }
        Ok(_) => bail!(
            "{} path '{}' is not a directory.",
            descriptive_name,
            source_path.display()
        ),
    }
}

/// The data subdirectory is working state for filters, never a deliverable.
fn cleanup_transient_data(ctx: &RunContext<'_>) -> Result<()> {
    let data = ctx.workspace().join(DATA_DIR);
    if data.exists() {
        fs::remove_dir_all(&data).with_context(|| {
            format!("Unable to clean the transient data directory '{}'.", data.display())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterDefinition, FilterRef, LocalDefinition, Profile, ProfileFilter, ProfileRef};
    use tempfile::TempDir;

    fn project_with_packs() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new_for_init("proj", "author");
        config.packs.resource_pack = "packs/RP".to_string();
        config.packs.behavior_pack = "packs/BP".to_string();
        config.regolith.data_path = "packs/data".to_string();
        fs::create_dir_all(dir.path().join("packs/RP/textures")).unwrap();
        fs::write(dir.path().join("packs/RP/textures/a.png"), b"png").unwrap();
        fs::create_dir_all(dir.path().join("packs/BP")).unwrap();
        fs::write(dir.path().join("packs/BP/manifest.json"), b"{}").unwrap();
        (dir, config)
    }

    fn ctx<'a>(config: &'a Config, project: &Path, cache: &Path) -> RunContext<'a> {
        RunContext::new(
            config,
            "default",
            project.to_path_buf(),
            cache.to_path_buf(),
        )
    }

    #[test]
    fn staging_copies_sources_and_substitutes_placeholders() {
        let (project, config) = project_with_packs();
        let cache = TempDir::new().unwrap();
        let ctx = ctx(&config, project.path(), cache.path());

        // data source is configured but absent: placeholder expected.
        stage_workspace(&config, &ctx).unwrap();

        let workspace = ctx.workspace();
        assert!(workspace.join("RP/textures/a.png").is_file());
        assert!(workspace.join("BP/manifest.json").is_file());
        assert!(workspace.join("data").is_dir());
    }

    #[test]
    fn staging_recreates_the_workspace_from_scratch() {
        let (project, config) = project_with_packs();
        let cache = TempDir::new().unwrap();
        let ctx = ctx(&config, project.path(), cache.path());

        fs::create_dir_all(ctx.workspace().join("RP")).unwrap();
        fs::write(ctx.workspace().join("RP/stale.txt"), b"old").unwrap();

        stage_workspace(&config, &ctx).unwrap();
        assert!(!ctx.workspace().join("RP/stale.txt").exists());
    }

    #[test]
    fn staging_fails_when_a_source_path_is_a_file() {
        let (project, mut config) = project_with_packs();
        fs::write(project.path().join("not-a-dir"), b"oops").unwrap();
        config.packs.resource_pack = "not-a-dir".to_string();

        let cache = TempDir::new().unwrap();
        let ctx = ctx(&config, project.path(), cache.path());
        let err = stage_workspace(&config, &ctx).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn a_check_failure_on_a_disabled_filter_still_aborts() {
        let mut config = Config::new_for_init("proj", "author");
        config.regolith.filter_definitions.insert(
            "broken".to_string(),
            FilterDefinition::Local(LocalDefinition {
                run_with: "python".to_string(),
                script: Some("does/not/exist.py".to_string()),
                command: None,
            }),
        );
        let profile = config.regolith.profiles.get_mut("default").unwrap();
        profile.filters.push(ProfileFilter::Filter(FilterRef {
            filter: "broken".to_string(),
            arguments: Vec::new(),
            settings: serde_json::Map::new(),
            disabled: true,
        }));

        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let ctx = RunContext::new(
            &config,
            "default",
            project.path().to_path_buf(),
            cache.path().to_path_buf(),
        );
        let profile = config.regolith.profiles.get("default").unwrap();
        let filters = collection::resolve_profile_filters(profile, &config).unwrap();
        assert!(filters[0].is_disabled());
        // Check validates the missing interpreter/script even though the
        // filter would never run.
        assert!(check_collection(&filters, &ctx).is_err());
    }

    #[test]
    fn empty_profile_runs_end_to_end_and_exports_nothing() {
        let (project, config) = project_with_packs();
        let cache = TempDir::new().unwrap();
        let ctx = ctx(&config, project.path(), cache.path());

        run_profile(&ctx).unwrap();

        let build = project.path().join("build");
        assert!(build.join("RP/textures/a.png").is_file());
        assert!(build.join("BP/manifest.json").is_file());
        // Transient data is never a deliverable.
        assert!(!ctx.workspace().join(DATA_DIR).exists());
        assert!(!build.join("data").exists());
    }

    #[test]
    fn unknown_profile_fails_before_any_phase() {
        let (project, config) = project_with_packs();
        let cache = TempDir::new().unwrap();
        let ctx = RunContext::new(
            &config,
            "release",
            project.path().to_path_buf(),
            cache.path().to_path_buf(),
        );
        let err = run_profile(&ctx).unwrap_err();
        assert!(err.to_string().contains("release"));
        assert!(!ctx.workspace().exists());
    }

    #[test]
    fn a_failing_nested_profile_is_reported_by_position() {
        let mut config = Config::new_for_init("proj", "author");
        // "loop" references itself; running it fails on the recursion guard.
        config.regolith.profiles.insert(
            "loop".to_string(),
            Profile {
                filters: vec![ProfileFilter::Profile(ProfileRef {
                    profile: "loop".to_string(),
                })],
                export: Default::default(),
            },
        );
        let profile = config.regolith.profiles.get_mut("default").unwrap();
        profile.filters.push(ProfileFilter::Profile(ProfileRef {
            profile: "loop".to_string(),
        }));

        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let ctx = RunContext::new(
            &config,
            "default",
            project.path().to_path_buf(),
            cache.path().to_path_buf(),
        );
        let profile = config.regolith.profiles.get("default").unwrap();
        let filters = collection::resolve_profile_filters(profile, &config).unwrap();
        let err = run_collection(&filters, &ctx).unwrap_err();
        let message = format!("{:#}", err);
        // Containers have no id; the wrapper names the position instead.
        assert!(message.contains("position 0"));
        assert!(!message.contains("filter ''"));
    }

    #[test]
    fn disabled_filters_are_skipped_at_run_time() {
        // A disabled filter with an unrunnable command must not abort Run.
        let mut config = Config::new_for_init("proj", "author");
        config.regolith.filter_definitions.insert(
            "never".to_string(),
            FilterDefinition::Local(LocalDefinition {
                run_with: "exe".to_string(),
                script: None,
                command: Some("definitely-not-a-real-binary-xyz".to_string()),
            }),
        );
        let profile = config.regolith.profiles.get_mut("default").unwrap();
        profile.filters.push(ProfileFilter::Filter(FilterRef {
            filter: "never".to_string(),
            arguments: Vec::new(),
            settings: serde_json::Map::new(),
            disabled: true,
        }));

        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let ctx = RunContext::new(
            &config,
            "default",
            project.path().to_path_buf(),
            cache.path().to_path_buf(),
        );
        let profile = config.regolith.profiles.get("default").unwrap();
        let filters = collection::resolve_profile_filters(profile, &config).unwrap();
        let modified = run_collection(&filters, &ctx).unwrap();
        assert!(!modified);
    }
}
