//! Command-line interface for macvland
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// macvland - macvlan network driver
#[derive(Parser)]
#[command(name = "macvland")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "macvland.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Attach a sandbox to an endpoint
    Join {
        /// Network ID
        network: String,

        /// Endpoint ID
        endpoint: String,

        /// Sandbox key (network namespace path)
        #[arg(short, long, default_value = "")]
        sandbox: String,

        /// Container-side interface name override
        #[arg(long)]
        ifname: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Detach a sandbox from an endpoint
    Leave {
        /// Network ID
        network: String,

        /// Endpoint ID
        endpoint: String,
    },

    /// List networks and endpoints
    Ls {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration
    Check,

    /// Find macvlan interfaces no persisted endpoint claims
    ///
    /// Takes the state directory lock, so it waits for a join running in
    /// another macvland process to record its interface first.
    Sweep {
        /// Delete the orphaned interfaces
        #[arg(long)]
        delete: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completions
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "macvland", &mut std::io::stdout());
    }
}
