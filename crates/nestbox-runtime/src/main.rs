//! nestbox: RFID nesting box occupancy monitor binary.
//! Single-process binary embedding decode, validation, and the
//! occupancy engine in-process.

use std::path::Path;

use anyhow::Context as _;
use clap::Parser;

use nestbox_core::{OccupancyEngine, ReadValidator, decode_frame};
use nestbox_reader::{ReplayReader, parse_hex_frame};

mod cli;
mod config;
mod monitor;
mod publish;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Run(opts) => {
            // Logs go to stderr; stdout belongs to the event stream.
            let filter = std::env::var("NESTBOX_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .with_writer(std::io::stderr)
                .init();

            tracing::info!("nestbox monitor starting");
            run(&args.config, opts).await?;
        }
        cli::Command::Decode(opts) => {
            let raw = parse_hex_frame(&opts.frame)
                .ok_or_else(|| anyhow::anyhow!("not hex text: {:?}", opts.frame))?;
            match decode_frame(&raw) {
                Some(tag) => println!("{tag}"),
                None => {
                    eprintln!("no tag in frame");
                    std::process::exit(1);
                }
            }
        }
        cli::Command::Roster => {
            let config = config::NestboxConfig::load(&args.config)?;
            let roster = config.roster()?;
            for occupant in roster.iter() {
                println!("{:>2}. {:<20} {}", occupant.number, occupant.name, occupant.tag);
            }
        }
    }

    Ok(())
}

async fn run(config_path: &Path, opts: cli::RunOpts) -> anyhow::Result<()> {
    let config = config::NestboxConfig::load(config_path)?;
    let roster = config.roster()?;
    tracing::info!("monitoring with {} known occupants", roster.len());

    let script = std::fs::read_to_string(&opts.replay)
        .with_context(|| format!("failed to read replay script {}", opts.replay.display()))?;
    let reader = ReplayReader::from_jsonl(&script)
        .with_context(|| format!("failed to parse replay script {}", opts.replay.display()))?;
    tracing::info!("replaying {} scripted frames", reader.remaining());

    let sink: Box<dyn publish::EventSink + Send> = match opts.events {
        cli::EventFormat::Json => Box::new(publish::JsonLinesSink::stdout()),
        cli::EventFormat::Log => Box::new(publish::TracingSink),
    };

    let state = monitor::MonitorState {
        engine: OccupancyEngine::new(config.engine_config()),
        validator: ReadValidator::new(config.validator_config()),
        roster,
        reader: Some(reader),
        sink,
        clock: monitor::MonotonicClock::new(),
        read_window: config.read_window(),
    };

    monitor::run_monitor(state, opts.tick_interval_ms).await
}
