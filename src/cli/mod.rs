//! CLI argument parsing using clap 4.x derive macros

pub mod config;
pub mod daemon;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Device agent that keeps managed apps running and the kiosk lock in place
///
/// Polls a remote desired-state record, starts the primary and kiosk apps,
/// applies or clears lockdown, and executes queued remote commands.
#[derive(Parser, Debug)]
#[command(name = "kioskd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to <config dir>/kioskd/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator in this process until interrupted
    Run {
        /// Mark the device active with kiosk mode on before the first cycle
        #[arg(short, long)]
        force_start: bool,

        /// With --force-start, rerun the full app start sequence
        #[arg(short, long, requires = "force_start")]
        restart_sequence: bool,

        /// Log to the data directory instead of stdout
        #[arg(long, hide = true)]
        detached: bool,
    },

    /// Start the orchestrator in the background
    Start {
        /// Mark the device active with kiosk mode on before the first cycle
        #[arg(short, long)]
        force_start: bool,

        /// With --force-start, rerun the full app start sequence
        #[arg(short, long, requires = "force_start")]
        restart_sequence: bool,
    },

    /// Stop the background orchestrator
    Stop,

    /// Show configuration, daemon and lock state
    Status,

    /// Ask the running orchestrator to bring the kiosk app back to the front
    Foreground,

    /// Print the stable id derived from this host
    DeviceId,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Create or update the config file
    Init {
        /// Backend base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Backend API key
        #[arg(long)]
        api_key: Option<String>,

        /// Site (unit) identifier
        #[arg(long)]
        site_id: Option<String>,

        /// Device id (derived from the host when omitted)
        #[arg(long)]
        device_id: Option<String>,

        /// App started first
        #[arg(long)]
        primary: Option<String>,

        /// App kept in the foreground and locked in kiosk mode
        #[arg(long)]
        kiosk: Option<String>,

        /// Prompt for required values that are still missing
        #[arg(short, long)]
        interactive: bool,
    },

    /// Print the effective configuration
    Show,
}
