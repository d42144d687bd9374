use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use regolith::cli::{Cli, Commands, handlers};

/// Entry point: set up logging, dispatch to the right handler and render
/// any error chain centrally.
fn main() {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();

    if let Err(e) = dispatch(cli) {
        eprintln!("\n{}: {:?}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => handlers::run::handle(args, false),
        Commands::Watch(args) => handlers::run::handle(args, true),
        Commands::Tool(args) => handlers::tool::handle(args),
        Commands::Install(args) => handlers::install::handle(args),
        Commands::InstallAll(args) => handlers::install::handle_all(args),
        Commands::Update(args) => handlers::update::handle(args),
        Commands::UpdateAll => handlers::update::handle_all(),
        Commands::Init(args) => handlers::init::handle(args),
        Commands::Clean(args) => handlers::clean::handle(args),
    }
}
