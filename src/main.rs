// src/main.rs

use anyhow::Result;
use clap::Parser;
use conveyor::cli::{Cli, Commands};
use conveyor::commands;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let exit = match cli.command {
        Commands::Apply {
            version,
            list,
            dry_run,
            yes,
            root,
            store,
            config,
            deps_command,
            verify_command,
        } => commands::cmd_apply(
            version,
            list,
            dry_run,
            yes,
            root,
            store,
            config,
            deps_command,
            verify_command,
        )?,
        Commands::Release {
            version,
            changes,
            messages,
            source,
            store,
            requirements_changed,
            notes,
            dry_run,
            config,
        } => commands::cmd_release(
            version,
            changes,
            messages,
            source,
            store,
            requirements_changed,
            notes,
            dry_run,
            config,
        )?,
    };

    if exit != 0 {
        std::process::exit(exit);
    }
    Ok(())
}
