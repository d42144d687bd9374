// Handlers for `regolith install` and `regolith install-all`.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::path::Path;

use crate::cli::args::{InstallAllArgs, InstallArgs};
use crate::cli::handlers::commons;
use crate::core::remote::{self, InstallSpec};
use crate::core::config_loader;
use crate::models::{Config, FilterDefinition, RemoteDefinition};
use crate::system::lock::SessionLock;

pub fn handle(args: &InstallArgs) -> Result<()> {
    let (root, mut config) = commons::load_project()?;
    commons::warn_if_git_missing();

    // Parse every specifier and reject conflicts before downloading
    // anything, so a failed install leaves the configuration unchanged.
    let specs = args
        .filters
        .iter()
        .map(|raw| remote::parse_install_spec(raw))
        .collect::<Result<Vec<_>>>()?;
    check_install_conflicts(&config, &specs, args.force)?;

    let cache_root = commons::cache_root(&root)?;
    let lock = SessionLock::acquire(&cache_root)?;
    let result = (|| -> Result<()> {
        for spec in specs {
            let resolved = remote::resolve_version(&spec.url, spec.version.as_ref())
                .with_context(|| format!("Could not resolve a version for '{}'.", spec.url))?;
            remote::download_filter(
                &spec.url,
                &spec.name,
                resolved.checkout.as_deref(),
                &cache_root,
                true,
            )?;
            println!(
                "{}",
                format!("Installed filter '{}' (version {}).", spec.name, resolved.persisted)
                    .green()
            );
            record_installed_filter(&mut config, &spec, &resolved.persisted);
        }
        config_loader::save_config(&root, &config)
    })();
    commons::finish_with_lock(result, lock)
}

/// Refuses specifiers whose name already has a `filterDefinitions` entry,
/// unless forced. Runs before any download or config write, so a refusal
/// leaves both the cache and the configuration file untouched.
fn check_install_conflicts(config: &Config, specs: &[InstallSpec], force: bool) -> Result<()> {
    if force {
        return Ok(());
    }
    for spec in specs {
        if config.regolith.filter_definitions.contains_key(&spec.name) {
            bail!(
                "Filter '{}' is already installed. Use --force to overwrite its definition.",
                spec.name
            );
        }
    }
    Ok(())
}

fn record_installed_filter(config: &mut Config, spec: &InstallSpec, persisted: &str) {
    config.regolith.filter_definitions.insert(
        spec.name.clone(),
        FilterDefinition::Remote(RemoteDefinition {
            url: spec.url.clone(),
            version: persisted.to_string(),
        }),
    );
}

pub fn handle_all(args: &InstallAllArgs) -> Result<()> {
    let (root, config) = commons::load_project()?;
    commons::warn_if_git_missing();

    let cache_root = commons::cache_root(&root)?;
    let lock = SessionLock::acquire(&cache_root)?;
    let result = install_defined_filters(&config, &cache_root, args.force);
    commons::finish_with_lock(result, lock)
}

/// Downloads every remote filter the configuration already defines, at its
/// persisted version. A filter whose cache entry is already populated is
/// skipped before any resolution happens, so a fully cached project needs
/// neither git nor a network connection unless `force` is set.
fn install_defined_filters(config: &Config, cache_root: &Path, force: bool) -> Result<()> {
    for (name, definition) in &config.regolith.filter_definitions {
        let FilterDefinition::Remote(def) = definition else {
            continue;
        };
        if !force && remote::filter_cache_path(cache_root, name).is_dir() {
            log::debug!("Filter '{}' is already cached, skipping.", name);
            continue;
        }
        let spec = remote::VersionSpec::parse(&def.version)
            .with_context(|| format!("Filter '{}' has an invalid persisted version.", name))?;
        let resolved = remote::resolve_version(&def.url, Some(&spec))
            .with_context(|| format!("Could not resolve a version for '{}'.", name))?;
        let downloaded = remote::download_filter(
            &def.url,
            name,
            resolved.checkout.as_deref(),
            cache_root,
            force,
        )?;
        if downloaded {
            println!("{}", format!("Installed filter '{}'.", name).green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_remote(name: &str, url: &str, version: &str) -> Config {
        let mut config = Config::new_for_init("proj", "author");
        config.regolith.filter_definitions.insert(
            name.to_string(),
            FilterDefinition::Remote(RemoteDefinition {
                url: url.to_string(),
                version: version.to_string(),
            }),
        );
        config
    }

    #[test]
    fn installing_an_already_present_name_without_force_is_refused() {
        let dir = TempDir::new().unwrap();
        let config = config_with_remote("names", "github.com/org/names", "1.0.0");
        config_loader::save_config(dir.path(), &config).unwrap();
        let saved = fs::read(dir.path().join("config.json")).unwrap();

        let specs = vec![remote::parse_install_spec("github.com/other/names").unwrap()];
        let err = check_install_conflicts(&config, &specs, false).unwrap_err();
        assert!(err.to_string().contains("already installed"));
        assert!(err.to_string().contains("--force"));

        // The refusal happens before anything is written back.
        assert_eq!(fs::read(dir.path().join("config.json")).unwrap(), saved);
    }

    #[test]
    fn force_overwrites_the_existing_definition_entry() {
        let mut config = config_with_remote("names", "github.com/org/names", "1.0.0");
        let specs = vec![remote::parse_install_spec("github.com/other/names==2.0.0").unwrap()];
        check_install_conflicts(&config, &specs, true).unwrap();

        record_installed_filter(&mut config, &specs[0], "2.0.0");
        match config.regolith.filter_definitions.get("names").unwrap() {
            FilterDefinition::Remote(def) => {
                assert_eq!(def.url, "github.com/other/names");
                assert_eq!(def.version, "2.0.0");
            }
            FilterDefinition::Local(_) => panic!("expected a remote definition"),
        }
    }

    #[test]
    fn install_all_skips_cached_filters_without_resolving() {
        // The URL is unreachable and the version floats; a populated cache
        // entry must short-circuit before any resolution is attempted.
        let cache = TempDir::new().unwrap();
        let config = config_with_remote("cached", "host.invalid/org/cached", "latest");
        fs::create_dir_all(remote::filter_cache_path(cache.path(), "cached")).unwrap();

        install_defined_filters(&config, cache.path(), false).unwrap();
    }
}
