//! # Filter Collection Resolution
//!
//! Expands a profile's declared filter list into a concrete, ordered run
//! list, and expands the sub-filters a remote filter declares through its
//! `filter.json` descriptor. Both produce the same thing: an ordered
//! `Vec<FilterRunner>` the pipeline consumes.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use std::fs;

use crate::constants::FILTER_DESCRIPTOR_FILENAME;
use crate::core::filter::{FilterInstaller, FilterRunner, ProfileRunner, RemoteFilter, RunConfig, RunContext};
use crate::models::{Config, Profile, ProfileFilter};

/// Resolves a profile's filter list against the config's installer mapping.
/// Order is preserved exactly as declared. A direct reference that does not
/// resolve to a filter definition is a configuration error; nested profile
/// references are validated to exist but expanded lazily at check/run time.
pub fn resolve_profile_filters(profile: &Profile, config: &Config) -> Result<Vec<FilterRunner>> {
    let mut runners = Vec::with_capacity(profile.filters.len());
    for (index, entry) in profile.filters.iter().enumerate() {
        match entry {
            ProfileFilter::Filter(entry) => {
                let definition = config
                    .regolith
                    .filter_definitions
                    .get(&entry.filter)
                    .ok_or_else(|| {
                        anyhow!(
                            "Filter '{}' (position {}) is not on the 'filterDefinitions' list of the configuration.",
                            entry.filter,
                            index
                        )
                    })?;
                let installer = FilterInstaller::from_definition(&entry.filter, definition);
                let runner = installer
                    .create_runner(RunConfig::from_profile_entry(entry))
                    .with_context(|| {
                        format!("Could not create a runner for filter '{}'.", entry.filter)
                    })?;
                runners.push(runner);
            }
            ProfileFilter::Profile(entry) => {
                if !config.regolith.profiles.contains_key(&entry.profile) {
                    bail!(
                        "Profile '{}' referenced at position {} does not exist in the configuration.",
                        entry.profile,
                        index
                    );
                }
                runners.push(FilterRunner::Profile(ProfileRunner {
                    profile: entry.profile.clone(),
                }));
            }
        }
    }
    Ok(runners)
}

/// Expands the sub-filters a remote filter declares in its `filter.json`.
///
/// Each entry doubles as installer spec and run configuration; a synthesized
/// id of the form `<parentId>:subfilter<index>` is injected so downstream
/// construction and logging work. Remote sub-filters are rejected outright:
/// transitive remote installation during expansion would make versioning of
/// transitively fetched code ambiguous and recursion unbounded.
pub fn subfilter_collection(
    parent: &RemoteFilter,
    ctx: &RunContext<'_>,
) -> Result<Vec<FilterRunner>> {
    let download_path = parent.download_path(&ctx.cache_root);
    let descriptor_path = download_path.join(FILTER_DESCRIPTOR_FILENAME);
    let raw = fs::read_to_string(&descriptor_path)
        .with_context(|| format!("Couldn't read '{}'.", descriptor_path.display()))?;
    let descriptor: Value = serde_json::from_str(&raw).with_context(|| {
        format!(
            "Couldn't parse '{}'. Does the file contain correct JSON?",
            descriptor_path.display()
        )
    })?;

    let entries = descriptor
        .get("filters")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            anyhow!(
                "Could not parse the 'filters' list of '{}'.",
                descriptor_path.display()
            )
        })?;

    let mut runners = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let object = entry.as_object().ok_or_else(|| {
            anyhow!(
                "Sub-filter {} of '{}' is not an object.",
                index,
                descriptor_path.display()
            )
        })?;
        let id = format!("{}:subfilter{}", parent.config.id, index);
        // The same descriptor object serves as both installer spec and
        // runtime configuration.
        let installer = FilterInstaller::from_descriptor(&id, object)?;
        if installer.is_remote() {
            bail!(
                "Remote filters are not allowed in sub-filters. Remote filter '{}', sub-filter {}.",
                parent.config.id,
                index
            );
        }
        let run_config = RunConfig::from_descriptor(&id, object)?;
        let mut runner = installer
            .create_runner(run_config)
            .with_context(|| format!("Could not parse sub-filter {} of '{}'.", index, parent.config.id))?;
        if let FilterRunner::Local(local) = &mut runner {
            local.filter_dir = Some(download_path.clone());
        }
        runner.copy_arguments(&parent.config.arguments);
        runners.push(runner);
    }
    Ok(runners)
}
