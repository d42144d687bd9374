// Handlers for `regolith run` and `regolith watch`.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::args::RunArgs;
use crate::cli::handlers::commons;
use crate::constants::DEFAULT_PROFILE;
use crate::core::{config_loader, pipeline};
use crate::core::filter::RunContext;
use crate::models::Config;
use crate::system::lock::SessionLock;
use crate::system::watcher::{SourceWatcher, WatchSignal};

pub fn handle(args: &RunArgs, watch: bool) -> Result<()> {
    let (root, config) = commons::load_project()?;
    let profile_name = args.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
    // Fail on an unknown profile before taking the lock.
    config_loader::get_profile(&config, profile_name)?;

    let cache_root = commons::cache_root(&root)?;
    let lock = SessionLock::acquire(&cache_root)?;

    let ctx = RunContext::new(&config, profile_name, root, cache_root);
    let result = if watch {
        watch_loop(&config, &ctx)
    } else {
        run_once(&ctx)
    };
    commons::finish_with_lock(result, lock)
}

fn run_once(ctx: &RunContext<'_>) -> Result<()> {
    pipeline::run_profile(ctx)
        .with_context(|| format!("Failed to run the '{}' profile.", ctx.profile_name))?;
    println!(
        "{}",
        format!("Successfully ran the '{}' profile.", ctx.profile_name).green()
    );
    Ok(())
}

/// Runs the profile, then suspends until a source file changes or the
/// process is told to terminate. A failed run is reported and watching
/// continues; only termination ends the loop.
fn watch_loop(config: &Config, ctx: &RunContext<'_>) -> Result<()> {
    let sources = [
        ctx.absolute_location.join(&config.packs.resource_pack),
        ctx.absolute_location.join(&config.packs.behavior_pack),
        ctx.absolute_location.join(&config.regolith.data_path),
    ];
    let watcher = SourceWatcher::new(&sources)?;

    loop {
        match pipeline::run_profile(ctx) {
            Ok(()) => println!(
                "{}",
                format!("Successfully ran the '{}' profile.", ctx.profile_name).green()
            ),
            Err(e) => eprintln!(
                "{}: {:#}",
                "Error".red().bold(),
                e.context(format!("Failed to run the '{}' profile.", ctx.profile_name))
            ),
        }
        println!("Watching for changes. Press Ctrl+C to stop.");
        match watcher.wait() {
            WatchSignal::SourceChanged => log::info!("Source changed, restarting."),
            WatchSignal::Terminated => {
                log::info!("Termination requested, stopping the watch loop.");
                return Ok(());
            }
        }
    }
}
