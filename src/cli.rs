use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pomofocus", version, about = "Pomodoro timer with optional site blocking")]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(short, long, global = true)]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the timer daemon (the default)
    Run {
        /// Block distracting sites during work intervals
        #[arg(long)]
        block: bool,

        /// Start the first work interval immediately
        #[arg(long)]
        start: bool,

        /// Do not open the WebSocket control channel
        #[arg(long)]
        no_server: bool,
    },

    /// Manage sites that are never blocked
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Remove a block left in the hosts file by a run that did not exit cleanly
    Unblock,

    /// Show the sites currently blocked through the hosts file
    Status,
}

#[derive(Debug, Subcommand)]
pub enum WhitelistAction {
    Add { site: String },
    Remove { site: String },
    List,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
