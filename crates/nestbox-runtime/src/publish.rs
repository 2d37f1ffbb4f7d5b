//! Event publishing: where engine output leaves the process.
//!
//! The monitor loop hands each [`NestEvent`] to a sink and moves on.
//! A sink failure is the sink's problem; it gets logged by the caller
//! and never feeds back into occupancy state.

use std::io::{self, Write};

use chrono::Utc;
use serde_json::Value;

use nestbox_core::{NestEvent, Occupant};

pub trait EventSink {
    fn publish(&mut self, event: &NestEvent) -> anyhow::Result<()>;
}

// ─── JSON lines ───────────────────────────────────────────────────

/// Writes one JSON object per event, stamped with the wall-clock time
/// of publication. Stdout is the usual target; logs go to stderr so
/// the stream stays machine-readable.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn publish(&mut self, event: &NestEvent) -> anyhow::Result<()> {
        let mut record = serde_json::to_value(event)?;
        if let Some(map) = record.as_object_mut() {
            map.insert("at".to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        writeln!(self.out, "{record}")?;
        self.out.flush()?;
        Ok(())
    }
}

// ─── Tracing ──────────────────────────────────────────────────────

/// Narrates events as human-readable log lines instead of emitting a
/// machine stream. Handy for watching a box interactively.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&mut self, event: &NestEvent) -> anyhow::Result<()> {
        match event {
            NestEvent::Entered { occupant } => {
                tracing::info!("{} (#{}) entered the box", occupant.name, occupant.number);
            }
            NestEvent::VisitCompleted { occupant, duration_secs } => {
                tracing::info!(
                    "{} (#{}) completed a {duration_secs}s visit",
                    occupant.name,
                    occupant.number
                );
            }
            NestEvent::Changed { previous, new, previous_duration_secs } => {
                tracing::info!(
                    "{} took over from {} after {previous_duration_secs}s",
                    new.name,
                    previous.name
                );
            }
            NestEvent::MultiOccupantDetected { occupants } => {
                tracing::info!("multiple occupants detected: {}", roster_names(occupants));
            }
            NestEvent::MultiOccupantContinued { occupants } => {
                tracing::info!("multiple occupants still present: {}", roster_names(occupants));
            }
            NestEvent::ReturnedToSingle { occupant } => {
                tracing::info!("back to a single occupant: {} (#{})", occupant.name, occupant.number);
            }
            NestEvent::Emptied => {
                tracing::info!("box emptied");
            }
        }
        Ok(())
    }
}

fn roster_names(occupants: &[Occupant]) -> String {
    occupants
        .iter()
        .map(|o| o.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ─── Tests ────────────────────────────────────────────────────────
