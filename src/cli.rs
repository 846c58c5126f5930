//! Command-line interface for tapbridge
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// tapbridge - bridge and TAP provisioning for virtual machines
#[derive(Parser)]
#[command(name = "tapbridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a bridge and a TAP device enrolled in it
    Provision {
        /// Bridge interface to create
        #[arg(short, long)]
        bridge: String,

        /// TAP interface to create
        #[arg(short, long)]
        tap: String,

        /// Request the bridge address over DHCP
        #[arg(long)]
        dhcp: bool,

        /// Static address for the bridge (e.g., 10.0.0.1/24)
        #[arg(long)]
        ip: Option<String>,

        /// Default route target (only with --ip)
        #[arg(short, long)]
        route: Option<String>,

        /// DNS server to associate with the bridge
        #[arg(short, long)]
        dns: Option<String>,

        /// Uplink interface to enslave to the bridge
        #[arg(short, long)]
        wan: Option<String>,

        /// Owner of the TAP device (defaults to the configured owner)
        #[arg(short, long)]
        user: Option<String>,

        /// Create the TAP device with multi-queue support
        #[arg(short, long, overrides_with = "no_multi_queue")]
        multi_queue: bool,

        /// Create a single-queue TAP device even if the config enables multi-queue
        #[arg(long, overrides_with = "multi_queue")]
        no_multi_queue: bool,

        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Report whether the target interfaces already exist
    Check {
        /// Bridge interface name
        #[arg(short, long)]
        bridge: String,

        /// TAP interface name
        #[arg(short, long)]
        tap: String,

        /// Uplink interface name
        #[arg(short, long)]
        wan: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Multi-queue choice made on the command line, `None` to use the config default
pub fn multi_queue_flag(multi_queue: bool, no_multi_queue: bool) -> Option<bool> {
    match (multi_queue, no_multi_queue) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "tapbridge", &mut std::io::stdout());
    }
}
