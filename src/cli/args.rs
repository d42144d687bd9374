use clap::Parser;

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// The profile to run. Defaults to 'default'.
    pub profile: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ToolArgs {
    /// The name of the filter to run, as defined in the configuration.
    pub filter: String,

    /// Extra arguments passed through to the filter.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Install specifiers of the form '<url>' or '<url>==<version>'.
    #[arg(required = true)]
    pub filters: Vec<String>,

    /// Overwrite filters that are already installed.
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Parser, Debug, Default)]
pub struct InstallAllArgs {
    /// Re-download filters that are already cached.
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// The names of the filters to update.
    #[arg(required = true)]
    pub filters: Vec<String>,
}

#[derive(Parser, Debug, Default)]
pub struct InitArgs {
    /// Initialize even if the current directory is not empty.
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Parser, Debug, Default)]
pub struct CleanArgs {
    /// Also clear this project's entry in the user-wide cache.
    #[arg(long)]
    pub user_cache: bool,
}
