//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A protected workstation activity agent
///
/// Reports activity status to a remote server and requires admin
/// approval before it will shut down.
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the configuration file (defaults to vigil.toml in the
    /// user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent (default when no command is given)
    Run,

    /// Validate the configuration file and print the effective values
    CheckConfig,
}
