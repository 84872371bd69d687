// src/cli.rs

//! CLI definitions for the conveyor release engine.
//!
//! Two commands:
//! - `apply` — consumer side: install or update to a target version
//! - `release` — producer side: classify changes and publish a release
//!
//! The command implementations live in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(author = "Conveyor Project")]
#[command(version)]
#[command(
    about = "Versioned self-updating distribution with staged atomic installs and rollback",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install or update the local copy to a target version
    Apply {
        /// Target version (e.g. 1.2.3). Required unless --list is given.
        version: Option<String>,

        /// List available versions and exit
        #[arg(long)]
        list: bool,

        /// Show the update plan without touching the filesystem
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt for minor/patch updates
        #[arg(short, long)]
        yes: bool,

        /// Install root directory (default: ~/.conveyor)
        #[arg(short, long)]
        root: Option<String>,

        /// Release store: an http(s):// URL or a local directory
        #[arg(short, long, default_value = "http://localhost:8000")]
        store: String,

        /// Path to the configuration file
        #[arg(short, long, default_value = "conveyor.toml")]
        config: String,

        /// Command run for dependency installation when a release
        /// requires it (e.g. "pip install -r requirements.txt")
        #[arg(long)]
        deps_command: Option<String>,

        /// Command run for environment verification after the update
        #[arg(long)]
        verify_command: Option<String>,
    },

    /// Classify changes, build a manifest, and publish a release
    Release {
        /// Explicit version to publish (computed from the change set
        /// when omitted)
        #[arg(short, long)]
        version: Option<String>,

        /// JSON file holding the change set {added, edited, deleted}
        #[arg(long, default_value = "changes.json")]
        changes: String,

        /// Commit messages feeding the breaking-change classifier
        /// (repeatable)
        #[arg(short = 'm', long = "message")]
        messages: Vec<String>,

        /// Directory holding the files to publish
        #[arg(long, default_value = ".")]
        source: String,

        /// Release store directory to publish into
        #[arg(short, long, default_value = "./release-store")]
        store: String,

        /// Mark the release as having changed dependency requirements
        #[arg(long)]
        requirements_changed: bool,

        /// Free-form release notes embedded in the manifest
        #[arg(long)]
        notes: Option<String>,

        /// Show the manifest without publishing
        #[arg(long)]
        dry_run: bool,

        /// Path to the configuration file
        #[arg(short, long, default_value = "conveyor.toml")]
        config: String,
    },
}
