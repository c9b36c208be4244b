// src/cli.rs
//! CLI definitions for the outfit provisioner
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/outfit/config.json";

#[derive(Parser)]
#[command(name = "outfit")]
#[command(author = "Outfit Contributors")]
#[command(version)]
#[command(about = "Declarative provisioning for apt-based systems", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the system against the configuration
    Apply {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,

        /// Provisioning root directory
        #[arg(short, long, default_value = "/")]
        root: String,

        /// Resolve and plan against real package facts without changing anything
        #[arg(long)]
        simulate: bool,
    },

    /// Resolve the configuration and print the resulting catalog
    Render {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
