//! # Filter / Installer Hierarchy
//!
//! Two cooperating roles, both closed enums:
//!
//! * [`FilterInstaller`] describes how a filter's payload is obtained (local
//!   to the project, or fetched from a remote repository into the cache) and
//!   turns a run configuration into a runner.
//! * [`FilterRunner`] is a bound, executable instance of a filter for one
//!   profile position. A runner never outlives the pipeline invocation that
//!   created it.
//!
//! Construction goes through the `from_descriptor` factory so new variants
//! are added in one place.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::{FILTER_CACHE_DIR, MAX_PROFILE_DEPTH, TMP_DIR};
use crate::core::{collection, config_loader, pipeline};
use crate::models::{Config, FilterDefinition, FilterRef, LocalDefinition};
use crate::system::executor;

const PYTHON_BIN: &str = if cfg!(windows) { "python" } else { "python3" };
const NODE_BIN: &str = "node";
const SHELL_BIN: &str = if cfg!(windows) { "cmd" } else { "sh" };
const SHELL_FLAG: &str = if cfg!(windows) { "/C" } else { "-c" };

// --- Run Context ---

/// Ephemeral, request-scoped state for one pipeline invocation. Nested
/// profile expansion derives children that link back to their parent, which
/// is what bounds recursion (see [`RunContext::profile_chain_contains`]).
#[derive(Debug)]
pub struct RunContext<'a> {
    pub config: &'a Config,
    pub profile_name: String,
    pub parent: Option<&'a RunContext<'a>>,
    /// Absolute path of the project root.
    pub absolute_location: PathBuf,
    /// The shared cache root guarded by the session lock.
    pub cache_root: PathBuf,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a Config,
        profile_name: &str,
        absolute_location: PathBuf,
        cache_root: PathBuf,
    ) -> Self {
        Self {
            config,
            profile_name: profile_name.to_string(),
            parent: None,
            absolute_location,
            cache_root,
        }
    }

    /// Derives a context for a nested profile, with `self` as parent.
    pub fn child(&'a self, profile_name: &str) -> Self {
        Self {
            config: self.config,
            profile_name: profile_name.to_string(),
            parent: Some(self),
            absolute_location: self.absolute_location.clone(),
            cache_root: self.cache_root.clone(),
        }
    }

    /// The scratch workspace filters read from and write to.
    pub fn workspace(&self) -> PathBuf {
        self.cache_root.join(TMP_DIR)
    }

    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self;
        while let Some(parent) = current.parent {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Whether a profile name appears anywhere in the ancestor chain,
    /// including the current context.
    pub fn profile_chain_contains(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if ctx.profile_name == name {
                return true;
            }
            current = ctx.parent;
        }
        false
    }
}

// --- Filter kinds ---

/// How a local filter payload is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunWith {
    Shell,
    Exe,
    Python,
    Node,
}

impl RunWith {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "shell" => Ok(Self::Shell),
            "exe" => Ok(Self::Exe),
            "python" => Ok(Self::Python),
            "node" => Ok(Self::Node),
            other => bail!(
                "Unsupported filter kind '{}'. Expected one of: shell, exe, python, node.",
                other
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Exe => "exe",
            Self::Python => "python",
            Self::Node => "node",
        }
    }
}

// --- Run configuration ---

/// Per-use overrides a profile position binds onto a filter: arguments,
/// a settings object, the disabled flag and the identifying id.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub id: String,
    pub arguments: Vec<String>,
    pub settings: Map<String, Value>,
    pub disabled: bool,
}

impl RunConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn from_profile_entry(entry: &FilterRef) -> Self {
        Self {
            id: entry.filter.clone(),
            arguments: entry.arguments.clone(),
            settings: entry.settings.clone(),
            disabled: entry.disabled,
        }
    }

    /// Builds a run configuration from a raw descriptor object (as found in
    /// a remote filter's `filter.json`), injecting the synthesized id.
    pub fn from_descriptor(id: &str, descriptor: &Map<String, Value>) -> Result<Self> {
        let arguments = match descriptor.get("arguments") {
            None => Vec::new(),
            Some(value) => serde_json::from_value(value.clone()).with_context(|| {
                format!("The 'arguments' property of filter '{}' must be a list of strings.", id)
            })?,
        };
        let settings = match descriptor.get("settings") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => bail!("The 'settings' property of filter '{}' must be an object.", id),
        };
        let disabled = descriptor
            .get("disabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self {
            id: id.to_string(),
            arguments,
            settings,
            disabled,
        })
    }
}

// --- Filter Installer ---

/// A named filter definition bound to its id: knows where the payload lives
/// and how to produce a runner for one profile position.
#[derive(Debug, Clone)]
pub struct FilterInstaller {
    pub id: String,
    pub definition: FilterDefinition,
}

impl FilterInstaller {
    pub fn from_definition(id: &str, definition: &FilterDefinition) -> Self {
        Self {
            id: id.to_string(),
            definition: definition.clone(),
        }
    }

    /// Centralized factory: parses a raw descriptor object into an installer.
    /// Used both for `config.json` entries and `filter.json` sub-filters.
    pub fn from_descriptor(id: &str, descriptor: &Map<String, Value>) -> Result<Self> {
        let definition: FilterDefinition =
            serde_json::from_value(Value::Object(descriptor.clone())).map_err(|_| {
                anyhow!(
                    "Descriptor for filter '{}' is neither a local nor a remote filter definition.",
                    id
                )
            })?;
        Ok(Self {
            id: id.to_string(),
            definition,
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.definition, FilterDefinition::Remote(_))
    }

    /// The cache directory owned by a remote installer. A resolved
    /// (name, version) pair always maps to this one directory, which is what
    /// makes repeated installation idempotent.
    pub fn download_path(&self, cache_root: &Path) -> Option<PathBuf> {
        match self.definition {
            FilterDefinition::Remote(_) => {
                Some(cache_root.join(FILTER_CACHE_DIR).join(&self.id))
            }
            FilterDefinition::Local(_) => None,
        }
    }

    /// Binds per-use arguments and settings, yielding a runner. Fails when
    /// the definition is structurally invalid for its kind.
    pub fn create_runner(&self, config: RunConfig) -> Result<FilterRunner> {
        match &self.definition {
            FilterDefinition::Local(def) => {
                Ok(FilterRunner::Local(LocalFilter::new(def, config)?))
            }
            FilterDefinition::Remote(def) => Ok(FilterRunner::Remote(RemoteFilter {
                name: self.id.clone(),
                url: def.url.clone(),
                version: def.version.clone(),
                config,
            })),
        }
    }
}

// --- Filter Runners ---

/// A bound, executable filter instance. `Profile` is a pure container for
/// nested profile references; it reports an empty id, which suppresses the
/// per-step log line in the pipeline.
#[derive(Debug, Clone)]
pub enum FilterRunner {
    Local(LocalFilter),
    Remote(RemoteFilter),
    Profile(ProfileRunner),
}

impl FilterRunner {
    pub fn id(&self) -> &str {
        match self {
            Self::Local(f) => &f.config.id,
            Self::Remote(f) => &f.config.id,
            Self::Profile(_) => "",
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            Self::Local(f) => f.config.disabled,
            Self::Remote(f) => f.config.disabled,
            Self::Profile(_) => false,
        }
    }

    /// Prepends a parent runner's bound arguments, so project-level
    /// overrides apply uniformly across a remote filter's sub-filters.
    pub fn copy_arguments(&mut self, parent_arguments: &[String]) {
        let config = match self {
            Self::Local(f) => &mut f.config,
            Self::Remote(f) => &mut f.config,
            Self::Profile(_) => return,
        };
        let mut merged = parent_arguments.to_vec();
        merged.append(&mut config.arguments);
        config.arguments = merged;
    }

    /// Validates prerequisites without touching the workspace. Invoked for
    /// every runner in a collection, disabled or not.
    pub fn check(&self, ctx: &RunContext<'_>) -> Result<()> {
        match self {
            Self::Local(f) => f.check(ctx),
            Self::Remote(f) => f.check(ctx),
            Self::Profile(f) => f.check(ctx),
        }
    }

    /// Executes the filter against the staged workspace. Returns whether the
    /// workspace was modified.
    pub fn run(&self, ctx: &RunContext<'_>) -> Result<bool> {
        match self {
            Self::Local(f) => f.run(ctx),
            Self::Remote(f) => f.run(ctx),
            Self::Profile(f) => f.run(ctx),
        }
    }
}

/// A filter whose payload is already on disk: a script run through an
/// interpreter, or a command line executed directly or through the shell.
#[derive(Debug, Clone)]
pub struct LocalFilter {
    pub kind: RunWith,
    pub script: Option<String>,
    pub command: Option<String>,
    /// Base directory for resolving relative script paths. Set to the remote
    /// filter's install path for sub-filters; project-local filters resolve
    /// against the project root.
    pub filter_dir: Option<PathBuf>,
    pub config: RunConfig,
}

impl LocalFilter {
    fn new(def: &LocalDefinition, config: RunConfig) -> Result<Self> {
        let kind = RunWith::parse(&def.run_with)
            .with_context(|| format!("Invalid definition for filter '{}'.", config.id))?;
        match kind {
            RunWith::Python | RunWith::Node if def.script.is_none() => bail!(
                "Filter '{}' of kind '{}' requires a 'script' property.",
                config.id,
                kind.as_str()
            ),
            RunWith::Shell | RunWith::Exe if def.command.is_none() => bail!(
                "Filter '{}' of kind '{}' requires a 'command' property.",
                config.id,
                kind.as_str()
            ),
            _ => {}
        }
        Ok(Self {
            kind,
            script: def.script.clone(),
            command: def.command.clone(),
            filter_dir: None,
            config,
        })
    }

    fn base_dir(&self, ctx: &RunContext<'_>) -> PathBuf {
        self.filter_dir
            .clone()
            .unwrap_or_else(|| ctx.absolute_location.clone())
    }

    fn check(&self, ctx: &RunContext<'_>) -> Result<()> {
        match self.kind {
            RunWith::Python => {
                if !executor::probe(PYTHON_BIN, &["--version"]) {
                    bail!(
                        "Python interpreter '{}' was not found on PATH, but filter '{}' requires it.",
                        PYTHON_BIN,
                        self.config.id
                    );
                }
            }
            RunWith::Node => {
                if !executor::probe(NODE_BIN, &["--version"]) {
                    bail!(
                        "Node.js was not found on PATH, but filter '{}' requires it.",
                        self.config.id
                    );
                }
            }
            RunWith::Shell => {
                if !executor::probe(SHELL_BIN, &[SHELL_FLAG, "exit 0"]) {
                    bail!(
                        "System shell '{}' is not available, but filter '{}' requires it.",
                        SHELL_BIN,
                        self.config.id
                    );
                }
            }
            RunWith::Exe => {
                // The payload is the toolchain; validate that the command
                // line parses to something runnable.
                let command = self.command.as_deref().unwrap_or_default();
                let parts = executor::split_command_line(command)?;
                if parts.is_empty() {
                    bail!("Filter '{}' has an empty 'command' property.", self.config.id);
                }
            }
        }
        if let Some(script) = &self.script {
            let path = self.base_dir(ctx).join(script);
            if !path.is_file() {
                bail!(
                    "Script '{}' for filter '{}' does not exist.",
                    path.display(),
                    self.config.id
                );
            }
        }
        Ok(())
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<bool> {
        let workspace = ctx.workspace();
        let base_dir = self.base_dir(ctx);

        let settings_json = if self.config.settings.is_empty() {
            None
        } else {
            Some(Value::Object(self.config.settings.clone()).to_string())
        };

        let mut env = HashMap::new();
        env.insert(
            "ROOT_DIR".to_string(),
            ctx.absolute_location.to_string_lossy().into_owned(),
        );
        env.insert(
            "FILTER_DIR".to_string(),
            base_dir.to_string_lossy().into_owned(),
        );
        if let Some(settings) = &settings_json {
            env.insert("FILTER_SETTINGS".to_string(), settings.clone());
        }

        let (program, args) = match self.kind {
            RunWith::Python | RunWith::Node => {
                let script = self.script.as_deref().unwrap_or_default();
                let script_path = base_dir.join(script).to_string_lossy().into_owned();
                let mut args = vec![script_path];
                if let Some(settings) = settings_json {
                    args.push(settings);
                }
                args.extend(self.config.arguments.iter().cloned());
                let program = if self.kind == RunWith::Python {
                    PYTHON_BIN
                } else {
                    NODE_BIN
                };
                (program.to_string(), args)
            }
            RunWith::Exe => {
                let command = self.command.as_deref().unwrap_or_default();
                let mut parts = executor::split_command_line(command)?;
                if parts.is_empty() {
                    bail!("Filter '{}' has an empty 'command' property.", self.config.id);
                }
                let program = parts.remove(0);
                if let Some(settings) = settings_json {
                    parts.push(settings);
                }
                parts.extend(self.config.arguments.iter().cloned());
                (program, parts)
            }
            RunWith::Shell => {
                let mut command_line = self.command.clone().unwrap_or_default();
                for arg in &self.config.arguments {
                    let quoted = shlex::try_quote(arg).map_err(|_| {
                        anyhow!(
                            "Argument for filter '{}' cannot be passed to the shell.",
                            self.config.id
                        )
                    })?;
                    command_line.push(' ');
                    command_line.push_str(&quoted);
                }
                (
                    SHELL_BIN.to_string(),
                    vec![SHELL_FLAG.to_string(), command_line],
                )
            }
        };

        executor::run_interactive(&program, &args, &workspace, &env)
            .with_context(|| format!("Filter '{}' failed.", self.config.id))?;
        Ok(true)
    }
}

/// A filter fetched from a remote repository. Its payload may be directly
/// executable sub-filters declared by a `filter.json` descriptor; running it
/// expands and runs that sub-collection in declared order.
#[derive(Debug, Clone)]
pub struct RemoteFilter {
    /// The definition key, which also keys the cache directory.
    pub name: String,
    pub url: String,
    pub version: String,
    pub config: RunConfig,
}

impl RemoteFilter {
    pub fn download_path(&self, cache_root: &Path) -> PathBuf {
        cache_root.join(FILTER_CACHE_DIR).join(&self.name)
    }

    fn check(&self, ctx: &RunContext<'_>) -> Result<()> {
        let path = self.download_path(&ctx.cache_root);
        if !path.is_dir() {
            bail!(
                "Filter '{}' is not installed.\nRun 'regolith install-all' to download it.",
                self.name
            );
        }
        let subfilters = collection::subfilter_collection(self, ctx)?;
        for runner in &subfilters {
            runner.check(ctx).with_context(|| {
                format!("Sub-filter check failed for remote filter '{}'.", self.config.id)
            })?;
        }
        Ok(())
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<bool> {
        let subfilters = collection::subfilter_collection(self, ctx)?;
        pipeline::run_collection(&subfilters, ctx)
    }
}

/// A nested profile reference. Stage and export belong to the outermost
/// invocation; this runner only checks and runs the nested profile's filters
/// against the already-staged workspace.
#[derive(Debug, Clone)]
pub struct ProfileRunner {
    pub profile: String,
}

impl ProfileRunner {
    fn expand(&self, ctx: &RunContext<'_>) -> Result<Vec<FilterRunner>> {
        if ctx.depth() >= MAX_PROFILE_DEPTH {
            bail!(
                "Nested profile expansion exceeded {} levels while expanding '{}'.",
                MAX_PROFILE_DEPTH,
                self.profile
            );
        }
        if ctx.profile_chain_contains(&self.profile) {
            bail!(
                "Profile '{}' is referenced recursively through its own filter chain.",
                self.profile
            );
        }
        let profile = config_loader::get_profile(ctx.config, &self.profile)?;
        collection::resolve_profile_filters(profile, ctx.config)
    }

    fn check(&self, ctx: &RunContext<'_>) -> Result<()> {
        let filters = self.expand(ctx)?;
        let child = ctx.child(&self.profile);
        pipeline::check_collection(&filters, &child)
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<bool> {
        let filters = self.expand(ctx)?;
        let child = ctx.child(&self.profile);
        pipeline::check_collection(&filters, &child)?;
        pipeline::run_collection(&filters, &child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteDefinition;

    fn local_def(run_with: &str, script: Option<&str>, command: Option<&str>) -> LocalDefinition {
        LocalDefinition {
            run_with: run_with.to_string(),
            script: script.map(str::to_string),
            command: command.map(str::to_string),
        }
    }

    #[test]
    fn unsupported_filter_kind_is_rejected_at_runner_creation() {
        let installer = FilterInstaller::from_definition(
            "bad",
            &FilterDefinition::Local(local_def("java", Some("Main.java"), None)),
        );
        let err = installer.create_runner(RunConfig::new("bad")).unwrap_err();
        assert!(format!("{:#}", err).contains("Unsupported filter kind 'java'"));
    }

    #[test]
    fn script_kinds_require_a_script_property() {
        let installer = FilterInstaller::from_definition(
            "pyfilter",
            &FilterDefinition::Local(local_def("python", None, None)),
        );
        let err = installer
            .create_runner(RunConfig::new("pyfilter"))
            .unwrap_err();
        assert!(err.to_string().contains("'script'"));
    }

    #[test]
    fn command_kinds_require_a_command_property() {
        let installer = FilterInstaller::from_definition(
            "shfilter",
            &FilterDefinition::Local(local_def("shell", None, None)),
        );
        let err = installer
            .create_runner(RunConfig::new("shfilter"))
            .unwrap_err();
        assert!(err.to_string().contains("'command'"));
    }

    #[test]
    fn remote_runner_keeps_the_definition_key_as_cache_key() {
        let installer = FilterInstaller::from_definition(
            "names",
            &FilterDefinition::Remote(RemoteDefinition {
                url: "github.com/org/names".to_string(),
                version: "1.0.0".to_string(),
            }),
        );
        let runner = installer.create_runner(RunConfig::new("names")).unwrap();
        match runner {
            FilterRunner::Remote(remote) => {
                let path = remote.download_path(Path::new("/cache"));
                assert!(path.ends_with("cache/filters/names"));
            }
            _ => panic!("expected a remote runner"),
        }
    }

    #[test]
    fn copy_arguments_prepends_parent_arguments() {
        let installer = FilterInstaller::from_definition(
            "child",
            &FilterDefinition::Local(local_def("exe", None, Some("tool"))),
        );
        let mut config = RunConfig::new("child");
        config.arguments = vec!["--own".to_string()];
        let mut runner = installer.create_runner(config).unwrap();
        runner.copy_arguments(&["--parent".to_string()]);
        match runner {
            FilterRunner::Local(local) => {
                assert_eq!(local.config.arguments, vec!["--parent", "--own"]);
            }
            _ => panic!("expected a local runner"),
        }
    }

    #[test]
    fn run_config_from_descriptor_applies_defaults() {
        let descriptor: Map<String, Value> =
            serde_json::from_str(r#"{"runWith": "exe", "command": "tool"}"#).unwrap();
        let config = RunConfig::from_descriptor("parent:subfilter0", &descriptor).unwrap();
        assert_eq!(config.id, "parent:subfilter0");
        assert!(config.arguments.is_empty());
        assert!(config.settings.is_empty());
        assert!(!config.disabled);
    }

    #[test]
    fn profile_chain_lookup_walks_all_ancestors() {
        let config = Config::new_for_init("p", "a");
        let root = RunContext::new(&config, "default", PathBuf::from("/p"), PathBuf::from("/c"));
        let child = root.child("nested");
        assert!(child.profile_chain_contains("default"));
        assert!(child.profile_chain_contains("nested"));
        assert!(!child.profile_chain_contains("other"));
        assert_eq!(child.depth(), 2);
    }
}
