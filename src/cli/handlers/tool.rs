// Handler for `regolith tool`: run a single filter against the source packs
// and write the result back in place.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;

use crate::cli::args::ToolArgs;
use crate::cli::handlers::commons;
use crate::core::filter::{FilterInstaller, RunConfig, RunContext};
use crate::core::{export, pipeline};
use crate::system::lock::SessionLock;

pub fn handle(args: &ToolArgs) -> Result<()> {
    let (root, config) = commons::load_project()?;
    let definition = config
        .regolith
        .filter_definitions
        .get(&args.filter)
        .ok_or_else(|| {
            anyhow!(
                "Filter '{}' is not on the 'filterDefinitions' list of the configuration.",
                args.filter
            )
        })?;

    let installer = FilterInstaller::from_definition(&args.filter, definition);
    let mut run_config = RunConfig::new(&args.filter);
    run_config.arguments = args.args.clone();
    let runner = installer.create_runner(run_config)?;

    let cache_root = commons::cache_root(&root)?;
    let lock = SessionLock::acquire(&cache_root)?;

    // The in-place export overwrites the sources, so everything up to and
    // including the filter run happens against the staged workspace first.
    let ctx = RunContext::new(&config, "[tool]", root, cache_root);
    let result = (|| -> Result<()> {
        runner
            .check(&ctx)
            .with_context(|| format!("Check failed for filter '{}'.", args.filter))?;
        pipeline::stage_workspace(&config, &ctx)?;
        runner
            .run(&ctx)
            .with_context(|| format!("Failed to run filter '{}'.", args.filter))?;
        export::export_in_place(&config, &ctx)?;
        println!(
            "{}",
            format!("Successfully applied filter '{}'.", args.filter).green()
        );
        Ok(())
    })();
    commons::finish_with_lock(result, lock)
}
