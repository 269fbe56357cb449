//! Command line interface for kodegen_devtool.
//!
//! Thin layer over [`crate::devtool::Dispatcher`]: parse arguments, build the
//! configuration, run one subcommand.

mod args;
mod commands;

pub use args::{Args, Command};
pub use commands::execute_command;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let args = Args::parse_args();
    execute_command(args).await
}
