//! Monitor loop: wires reader → decode → validate → roster → engine.
//! Runs as a tokio task, pacing the engine at a configurable tick.
//!
//! The reader talks to real hardware (or a replay script) with blocking
//! reads and sleeps, so every touch of it happens on the blocking pool.
//! The reader lives in an `Option` and is taken for the duration of
//! each blocking call, then put back.

use std::time::{Duration, Instant};

use anyhow::Context as _;
use tokio::time::interval;

use nestbox_core::{
    Monotonic, NestEvent, OccupancyEngine, ReadValidator, Roster, decode_frame,
};
use nestbox_reader::TagReader;

use crate::publish::EventSink;

// ─── Clock ────────────────────────────────────────────────────────

/// Milliseconds since construction, as the engine's [`Monotonic`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    pub fn now(&self) -> Monotonic {
        Monotonic::from_millis(self.epoch.elapsed().as_millis() as u64)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

// ─── State ────────────────────────────────────────────────────────

/// Everything one monitored box needs, owned by the loop task.
pub struct MonitorState<R> {
    pub engine: OccupancyEngine,
    pub validator: ReadValidator,
    pub roster: Roster,
    /// `None` only while a blocking capture or reset runs on the
    /// blocking pool.
    pub reader: Option<R>,
    pub sink: Box<dyn EventSink + Send>,
    pub clock: MonotonicClock,
    /// Budget handed to each blocking frame capture.
    pub read_window: Duration,
}

// ─── Loop ─────────────────────────────────────────────────────────

/// Run the monitor: starts the tick loop and waits for shutdown.
pub async fn run_monitor<R: TagReader + Send + 'static>(
    state: MonitorState<R>,
    tick_ms: u64,
) -> anyhow::Result<()> {
    let monitor = tokio::spawn(run_monitor_loop(state, tick_ms));

    // Wait for shutdown signal (ctrl-c or SIGTERM)
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    tokio::select! {
        () = shutdown => {}
        _ = monitor => {
            tracing::warn!("monitor loop exited unexpectedly");
        }
    }

    tracing::info!("monitor stopped");
    Ok(())
}

async fn run_monitor_loop<R: TagReader + Send + 'static>(
    mut state: MonitorState<R>,
    tick_ms: u64,
) {
    let mut ticker = interval(Duration::from_millis(tick_ms));

    loop {
        ticker.tick().await;

        if let Err(e) = monitor_tick(&mut state).await {
            tracing::warn!("monitor tick failed: {e}");
        }
    }
}

/// One pass: advance timers, execute a requested probe reset, then
/// pull at most one frame through decode → validate → roster → engine.
async fn monitor_tick<R: TagReader + Send + 'static>(
    state: &mut MonitorState<R>,
) -> anyhow::Result<()> {
    // 1. Timers first: a departure or probe is due regardless of
    // whether the antenna has anything for us.
    let output = state.engine.poll(state.clock.now());
    publish_events(state, &output.events);
    if output.reset_requested {
        perform_reset(state).await?;
    }

    // 2. One frame per tick keeps the loop honest about pacing.
    let Some(raw) = read_one_frame(state).await? else {
        return Ok(());
    };

    let Some(tag) = decode_frame(&raw) else {
        tracing::debug!("dropped undecodable {} byte frame", raw.len());
        return Ok(());
    };

    let Some(reading) = state.validator.observe(tag, state.clock.now()) else {
        return Ok(());
    };

    let Some(occupant) = state.roster.lookup(&reading.tag) else {
        tracing::debug!("unknown tag {} ignored", reading.tag);
        return Ok(());
    };

    let output = state.engine.observe(occupant, reading.accepted_at);
    publish_events(state, &output.events);
    Ok(())
}

/// Power-cycle the reader and rearm the engine's confirmation window.
/// The window is armed even when the pulse fails; a dead reader then
/// resolves as a departure instead of leaving the probe open forever.
async fn perform_reset<R: TagReader + Send + 'static>(
    state: &mut MonitorState<R>,
) -> anyhow::Result<()> {
    let Some(mut reader) = state.reader.take() else {
        anyhow::bail!("reader unavailable for reset");
    };
    let (reader, result) = tokio::task::spawn_blocking(move || {
        let result = reader.reset();
        (reader, result)
    })
    .await
    .context("reset task panicked")?;
    state.reader = Some(reader);

    if let Err(e) = result {
        tracing::warn!("reader reset failed: {e}");
    }
    state.validator.reset();
    state.engine.note_rearmed(state.clock.now());
    Ok(())
}

/// Capture one frame within the configured window. Capture faults are
/// logged and swallowed; the loop keeps monitoring.
async fn read_one_frame<R: TagReader + Send + 'static>(
    state: &mut MonitorState<R>,
) -> anyhow::Result<Option<Vec<u8>>> {
    let Some(mut reader) = state.reader.take() else {
        anyhow::bail!("reader unavailable for capture");
    };
    let window = state.read_window;
    let (reader, result) = tokio::task::spawn_blocking(move || {
        let result = reader.read_frame(window);
        (reader, result)
    })
    .await
    .context("capture task panicked")?;
    state.reader = Some(reader);

    match result {
        Ok(frame) => Ok(frame),
        Err(e) => {
            tracing::warn!("frame capture failed: {e}");
            Ok(None)
        }
    }
}

fn publish_events<R>(state: &mut MonitorState<R>, events: &[NestEvent]) {
    for event in events {
        tracing::debug!("publishing {}", event.kind());
        if let Err(e) = state.sink.publish(event) {
            tracing::warn!("event sink failed: {e}");
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
