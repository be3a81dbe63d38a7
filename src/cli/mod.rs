//! Command line entry points
//!
//! - `serve`: run the HTTP API (default)
//! - `migrate`: bring the PostgreSQL schema up to date and exit

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// Model Market - AI model listings, per-model API keys and usage metering
#[derive(Parser)]
#[command(name = "model-market")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the API server (default)
    Serve,

    /// Run PostgreSQL schema setup and exit
    Migrate,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
