// src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::CONFIG_SCHEMA_URL;

// --- `config.json` MODELS (what is read from the configuration file) ---

/// The deserialized structure of a project's `config.json`.
///
/// Loaded once per command invocation and treated as immutable for its
/// duration. Maps are `BTreeMap` so that saving a loaded config produces
/// byte-stable output.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Attached for editor tooling, never interpreted.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    pub author: String,
    pub packs: Packs,
    pub regolith: RegolithProject,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Packs {
    pub behavior_pack: String,
    pub resource_pack: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegolithProject {
    pub data_path: String,
    #[serde(default)]
    pub filter_definitions: BTreeMap<String, FilterDefinition>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// A named filter definition. Remote definitions carry the source URL and a
/// version specifier; local definitions point at a payload already under
/// project control. Uses `untagged` so the JSON shape stays flat: the `url`
/// key marks a remote filter, the `runWith` key a local one.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterDefinition {
    Remote(RemoteDefinition),
    Local(LocalDefinition),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteDefinition {
    pub url: String,
    /// A semver string, a git commit hash, `HEAD`, or `latest`. `HEAD` and
    /// `latest` are stored literally so later installs re-resolve them.
    pub version: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalDefinition {
    /// The filter kind (`shell`, `exe`, `python`, `node`). Kept as a plain
    /// string in the data model; validated when a runner is created.
    pub run_with: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// A named, ordered composition of filters plus an export policy.
/// Filter order is significant and preserved.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    #[serde(default)]
    pub filters: Vec<ProfileFilter>,
    #[serde(default)]
    pub export: ExportTarget,
}

/// One entry of a profile's filter list: either a bound reference to a named
/// filter definition, or a reference to another profile (nested composition).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProfileFilter {
    Filter(FilterRef),
    Profile(ProfileRef),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FilterRef {
    /// Must resolve to a key of `filterDefinitions`.
    pub filter: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub settings: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProfileRef {
    pub profile: String,
}

/// Destination policy for a profile's output.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportTarget {
    pub target: ExportMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bp_path: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Copy the packs to `build/RP` and `build/BP` under the project root.
    Local,
    /// Copy the packs to the explicitly configured `rpPath` and `bpPath`.
    Exact,
}

impl Default for ExportTarget {
    fn default() -> Self {
        Self {
            target: ExportMode::Local,
            rp_path: None,
            bp_path: None,
            read_only: false,
        }
    }
}

impl Config {
    /// Creates the scaffold configuration written by `regolith init`: empty
    /// filter definitions and a single empty `default` profile, so that
    /// `init` followed by `run` succeeds and produces an empty export.
    pub fn new_for_init(name: &str, author: &str) -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert("default".to_string(), Profile::default());

        Self {
            schema: Some(CONFIG_SCHEMA_URL.to_string()),
            name: name.to_string(),
            author: author.to_string(),
            packs: Packs {
                behavior_pack: "./packs/BP".to_string(),
                resource_pack: "./packs/RP".to_string(),
            },
            regolith: RegolithProject {
                data_path: "./packs/data".to_string(),
                filter_definitions: BTreeMap::new(),
                profiles,
            },
        }
    }
}
