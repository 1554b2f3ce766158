//! Command-line configuration for the replay binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about = "Replay a block fixture through an SCDB instance")]
pub struct Config {
    /// Path to a JSON fixture describing the blocks to replay.
    pub fixture: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the full SCDB state after each block instead of only at the end.
    #[arg(long)]
    pub trace_blocks: bool,
}

impl Config {
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
