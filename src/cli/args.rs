//! CLI argument definitions using clap
//!
//! Commands:
//! - mirrornet init --config <path> --role <source|replica|registry>
//! - mirrornet start --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mirrornet - signed replication and instance discovery for
/// community-run read replicas
#[derive(Parser, Debug)]
#[command(name = "mirrornet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a data directory and config skeleton
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./mirrornet.json")]
        config: PathBuf,

        /// Node role: source, replica, or registry
        #[arg(long, default_value = "replica")]
        role: String,
    },

    /// Start the node
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./mirrornet.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
