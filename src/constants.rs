// src/constants.rs

/// The name of the project configuration file.
pub const CONFIG_FILENAME: &str = "config.json";

/// The JSON schema URL attached to generated configuration files.
/// It is written for editor tooling and never interpreted by regolith.
pub const CONFIG_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/Bedrock-OSS/regolith-schemas/main/config/v1.json";

/// The name of the project-local cache directory.
pub const DOT_REGOLITH_DIR: &str = ".regolith";

/// The scratch workspace directory (inside the cache root), recreated on every run.
pub const TMP_DIR: &str = "tmp";

/// Workspace subdirectory holding the staged resource pack.
pub const RP_DIR: &str = "RP";

/// Workspace subdirectory holding the staged behavior pack.
pub const BP_DIR: &str = "BP";

/// Workspace subdirectory holding transient filter data.
pub const DATA_DIR: &str = "data";

/// Directory (inside the cache root) holding installed remote filter payloads.
pub const FILTER_CACHE_DIR: &str = "cache/filters";

/// The descriptor file a remote filter ships to declare its sub-filters.
pub const FILTER_DESCRIPTOR_FILENAME: &str = "filter.json";

/// The session lock file (inside the cache root).
pub const LOCK_FILENAME: &str = "session_lock";

/// Subdirectory of the OS cache directory used for the user-global cache mode.
pub const USER_CACHE_DIR: &str = "regolith";

/// The profile used by `regolith run` when none is given.
pub const DEFAULT_PROFILE: &str = "default";

/// Export output directory for the `local` export target (under the project root).
pub const BUILD_DIR: &str = "build";

/// Upper bound on nested profile expansion. Profiles referencing each other
/// in a cycle are rejected before this limit is ever reached; the depth cap
/// is a backstop for pathologically deep (but acyclic) chains.
pub const MAX_PROFILE_DEPTH: usize = 16;

/// Contents of the `.gitignore` written by `regolith init`.
pub const GITIGNORE: &str = "/.regolith\n/build\n";
