use clap::{Parser, Subcommand};

pub mod args;
pub mod handlers;

use args::{CleanArgs, InitArgs, InstallAllArgs, InstallArgs, RunArgs, ToolArgs, UpdateArgs};

/// regolith: a compilation pipeline for data-driven content packs.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Print debug-level diagnostics.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a profile: check, stage, run the filter chain and export.
    Run(RunArgs),
    /// Run a profile, then re-run it whenever a source file changes.
    Watch(RunArgs),
    /// Run a single filter against the packs and write the result back in place.
    Tool(ToolArgs),
    /// Download remote filters and add them to the configuration.
    Install(InstallArgs),
    /// Download every remote filter the configuration defines.
    InstallAll(InstallAllArgs),
    /// Re-resolve and re-download the named remote filters.
    Update(UpdateArgs),
    /// Re-resolve and re-download every floating remote filter.
    UpdateAll,
    /// Scaffold a new project in the current directory.
    Init(InitArgs),
    /// Remove the project cache and build output.
    Clean(CleanArgs),
}
