// Handlers for `regolith update` and `regolith update-all`.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::args::UpdateArgs;
use crate::cli::handlers::commons;
use crate::core::remote::{self, VersionSpec};
use crate::models::{Config, FilterDefinition};
use crate::system::lock::SessionLock;

pub fn handle(args: &UpdateArgs) -> Result<()> {
    let (root, config) = commons::load_project()?;
    commons::warn_if_git_missing();

    let cache_root = commons::cache_root(&root)?;
    let lock = SessionLock::acquire(&cache_root)?;
    let result = (|| -> Result<()> {
        for name in &args.filters {
            match config.regolith.filter_definitions.get(name) {
                Some(FilterDefinition::Remote(_)) => {
                    update_filter(&config, name, &cache_root)?;
                }
                // Not fatal: the remaining names are still updated.
                Some(FilterDefinition::Local(_)) => println!(
                    "{}",
                    format!("Warning: filter '{}' is a local filter, skipping.", name).yellow()
                ),
                None => println!(
                    "{}",
                    format!("Warning: filter '{}' is not installed, skipping.", name).yellow()
                ),
            }
        }
        Ok(())
    })();
    commons::finish_with_lock(result, lock)
}

/// Re-resolves and re-downloads every remote filter that tracks a floating
/// version (`HEAD` or `latest`). Explicitly pinned filters are untouched;
/// updating those requires naming them in `update` directly.
pub fn handle_all() -> Result<()> {
    let (root, config) = commons::load_project()?;
    commons::warn_if_git_missing();

    let cache_root = commons::cache_root(&root)?;
    let lock = SessionLock::acquire(&cache_root)?;
    let result = (|| -> Result<()> {
        for (name, definition) in &config.regolith.filter_definitions {
            let FilterDefinition::Remote(def) = definition else {
                continue;
            };
            let spec = VersionSpec::parse(&def.version).with_context(|| {
                format!("Filter '{}' has an invalid persisted version.", name)
            })?;
            if !matches!(spec, VersionSpec::Head | VersionSpec::Latest) {
                log::debug!("Filter '{}' is pinned to '{}', skipping.", name, def.version);
                continue;
            }
            update_filter(&config, name, &cache_root)?;
        }
        Ok(())
    })();
    commons::finish_with_lock(result, lock)
}

fn update_filter(config: &Config, name: &str, cache_root: &std::path::Path) -> Result<()> {
    let Some(FilterDefinition::Remote(def)) = config.regolith.filter_definitions.get(name) else {
        unreachable!("callers verified the definition is remote");
    };
    let spec = VersionSpec::parse(&def.version)
        .with_context(|| format!("Filter '{}' has an invalid persisted version.", name))?;
    let resolved = remote::resolve_version(&def.url, Some(&spec))
        .with_context(|| format!("Could not resolve a version for '{}'.", name))?;
    remote::download_filter(&def.url, name, resolved.checkout.as_deref(), cache_root, true)?;
    println!("{}", format!("Updated filter '{}'.", name).green());
    Ok(())
}
