//! CLI definitions for TabPilot.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// TabPilot CLI.
#[derive(Parser)]
#[command(name = "tabpilot")]
#[command(about = "Drive a single browser tab with typed commands")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Read one JSON command record per stdin line (default)
    Run,

    /// Execute a single JSON command record
    Exec {
        /// Command record, e.g. '{"type":"navigation","url":"example.com"}'
        record: String,
    },
}
