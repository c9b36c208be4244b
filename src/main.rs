// src/main.rs

use anyhow::Result;
use clap::Parser;

use outfit::cli::{Cli, Commands};
use outfit::commands;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Apply {
            config,
            root,
            simulate,
        }) => commands::cmd_apply(&config, &root, simulate),
        Some(Commands::Render { config }) => commands::cmd_render(&config),
        Some(Commands::Completions { shell }) => commands::cmd_completions(shell),
        None => {
            // No command provided, show help
            println!("Outfit System Provisioner v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'outfit --help' for usage information");
            Ok(())
        }
    }
}
