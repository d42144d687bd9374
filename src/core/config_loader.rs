//! # Config Loader
//!
//! Reads and writes the project's `config.json`. The configuration is loaded
//! once per command invocation and treated as immutable for its duration;
//! only `install`, `update` and `init` write it back.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::CONFIG_FILENAME;
use crate::models::{Config, Profile};

/// Returns the path of the configuration file for a project root.
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILENAME)
}

/// Loads and parses `config.json` from the project root.
pub fn load_config(project_root: &Path) -> Result<Config> {
    let path = config_path(project_root);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Could not read '{}'.", path.display()))?;
    let config: Config = serde_json::from_str(&raw)
        .with_context(|| format!("Could not parse '{}'. Is it valid JSON?", path.display()))?;
    Ok(config)
}

/// Writes the configuration back to `config.json`, tab-indented.
pub fn save_config(project_root: &Path, config: &Config) -> Result<()> {
    let path = config_path(project_root);
    let mut buf = Vec::with_capacity(4096);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config
        .serialize(&mut serializer)
        .context("Could not serialize the configuration.")?;
    buf.push(b'\n');
    fs::write(&path, buf).with_context(|| format!("Could not write '{}'.", path.display()))?;
    Ok(())
}

/// Looks up a profile by name, with a clear error for unknown names.
pub fn get_profile<'a>(config: &'a Config, name: &str) -> Result<&'a Profile> {
    config
        .regolith
        .profiles
        .get(name)
        .ok_or_else(|| anyhow!("Profile '{}' does not exist in the configuration.", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterDefinition, FilterRef, ProfileFilter, RemoteDefinition};
    use tempfile::TempDir;

    #[test]
    fn config_survives_a_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new_for_init("roundtrip", "someone");
        config.regolith.filter_definitions.insert(
            "names".to_string(),
            FilterDefinition::Remote(RemoteDefinition {
                url: "github.com/org/names".to_string(),
                version: "HEAD".to_string(),
            }),
        );
        let profile = config.regolith.profiles.get_mut("default").unwrap();
        profile.filters.push(ProfileFilter::Filter(FilterRef {
            filter: "names".to_string(),
            arguments: vec!["--fast".to_string()],
            settings: serde_json::Map::new(),
            disabled: false,
        }));

        save_config(dir.path(), &config).unwrap();
        let loaded = load_config(dir.path()).unwrap();

        assert_eq!(loaded.name, config.name);
        assert_eq!(
            loaded.regolith.filter_definitions,
            config.regolith.filter_definitions
        );
        assert_eq!(loaded.regolith.profiles, config.regolith.profiles);

        // Saving what was loaded must be byte-stable.
        save_config(dir.path(), &loaded).unwrap();
        let reread = load_config(dir.path()).unwrap();
        assert_eq!(reread.regolith.profiles, loaded.regolith.profiles);
    }

    #[test]
    fn unknown_profile_is_a_named_error() {
        let config = Config::new_for_init("p", "a");
        let err = get_profile(&config, "release").unwrap_err();
        assert!(err.to_string().contains("release"));
    }

    #[test]
    fn missing_config_file_reports_the_path() {
        let dir = TempDir::new().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(CONFIG_FILENAME));
    }
}
