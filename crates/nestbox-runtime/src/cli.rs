//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "nestbox", about = "RFID nesting box occupancy monitor")]
pub struct Cli {
    /// Config file with the roster and tuning tables
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "NESTBOX_CONFIG",
        default_value = "nestbox.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the monitor loop against a replay script
    Run(RunOpts),
    /// Decode one raw frame (hex text) and print the tag
    Decode(DecodeOpts),
    /// Print the resolved roster table
    Roster,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Replay script: JSON lines of {"at_ms", "frame"} entries
    #[arg(long)]
    pub replay: PathBuf,

    /// Tick interval in milliseconds
    #[arg(long, default_value = "100")]
    pub tick_interval_ms: u64,

    /// Event output: JSON lines on stdout, or human log lines
    #[arg(long, value_enum, default_value_t = EventFormat::Json)]
    pub events: EventFormat,
}

#[derive(clap::Args)]
pub struct DecodeOpts {
    /// Raw frame as hex text, e.g. "02 32 30 30 33 45 39 38 43 38 03"
    pub frame: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventFormat {
    Json,
    Log,
}
