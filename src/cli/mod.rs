//! CLI module for mirrornet
//!
//! Provides the command-line interface:
//! - init: Create a data directory and config skeleton for a role
//! - start: Boot the role's subsystems and serve until interrupted

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{init, run_command, start, Config, NodeRole};
pub use errors::{CliError, CliErrorCode, CliResult};

/// Parse arguments and run the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}
