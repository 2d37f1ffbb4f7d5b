//! Frame capture and reset discipline over a byte link.
//!
//! A tag pass arrives as a burst of bytes with idle line on both sides.
//! Capture paces itself between bytes so slow UART bursts arrive whole,
//! stops once the line stays quiet through a grace wait, and never holds
//! the line past the caller's window. The reset pulse drains whatever
//! the old scan cycle left behind, holds the reset line low, and then
//! waits out the reader's settle time so the next frame comes from a
//! fresh cycle.

use std::time::{Duration, Instant};

use crate::error::ReaderError;
use crate::link::{ByteLink, LineLevel};

/// Default frame capture window (milliseconds).
pub const READ_WINDOW_MS: u64 = 1_000;
/// Largest raw frame accepted from the line (bytes).
pub const FRAME_BUF_CAP: usize = 256;
/// Pause after each byte so a slow burst arrives intact (milliseconds).
pub const BYTE_PACING_MS: u64 = 2;
/// Grace wait once the line goes quiet mid-burst (milliseconds).
pub const QUIET_GRACE_MS: u64 = 10;
/// Reset line hold time for a full power cycle (milliseconds).
pub const RESET_HOLD_MS: u64 = 200;
/// Settle time after release while the scan cycle restarts (milliseconds).
pub const RESET_SETTLE_MS: u64 = 1_000;

/// A source of raw tag frames plus the power-cycle control the
/// occupancy probe needs. Both operations may block up to their
/// configured windows; drive them from a blocking-friendly context.
pub trait TagReader {
    /// Capture one raw frame. `Ok(None)` when the line is idle.
    fn read_frame(&mut self, window: Duration) -> Result<Option<Vec<u8>>, ReaderError>;

    /// Power-cycle the reader and block until it settles.
    fn reset(&mut self) -> Result<(), ReaderError>;
}

impl<R: TagReader + ?Sized> TagReader for &mut R {
    fn read_frame(&mut self, window: Duration) -> Result<Option<Vec<u8>>, ReaderError> {
        (**self).read_frame(window)
    }

    fn reset(&mut self) -> Result<(), ReaderError> {
        (**self).reset()
    }
}

impl<R: TagReader + ?Sized> TagReader for Box<R> {
    fn read_frame(&mut self, window: Duration) -> Result<Option<Vec<u8>>, ReaderError> {
        (**self).read_frame(window)
    }

    fn reset(&mut self) -> Result<(), ReaderError> {
        (**self).reset()
    }
}

/// Frame capture over a [`ByteLink`] with burst pacing and the reset
/// pulse the hardware expects.
#[derive(Debug)]
pub struct SerialFrameReader<L> {
    link: L,
    byte_pacing: Duration,
    quiet_grace: Duration,
    reset_hold: Duration,
    reset_settle: Duration,
}

impl<L: ByteLink> SerialFrameReader<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            byte_pacing: Duration::from_millis(BYTE_PACING_MS),
            quiet_grace: Duration::from_millis(QUIET_GRACE_MS),
            reset_hold: Duration::from_millis(RESET_HOLD_MS),
            reset_settle: Duration::from_millis(RESET_SETTLE_MS),
        }
    }

    /// Override burst pacing: the per-byte pause and the quiet grace.
    #[must_use]
    pub fn with_capture_pacing(mut self, byte_pacing: Duration, quiet_grace: Duration) -> Self {
        self.byte_pacing = byte_pacing;
        self.quiet_grace = quiet_grace;
        self
    }

    /// Override the reset pulse: the low hold and the settle wait.
    #[must_use]
    pub fn with_reset_pulse(mut self, hold: Duration, settle: Duration) -> Self {
        self.reset_hold = hold;
        self.reset_settle = settle;
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}

impl<L: ByteLink> TagReader for SerialFrameReader<L> {
    fn read_frame(&mut self, window: Duration) -> Result<Option<Vec<u8>>, ReaderError> {
        if self.link.bytes_pending() == 0 {
            return Ok(None);
        }
        let started = Instant::now();
        let mut frame = Vec::new();
        while started.elapsed() < window && frame.len() < FRAME_BUF_CAP {
            match self.link.read_byte()? {
                Some(byte) => {
                    frame.push(byte);
                    std::thread::sleep(self.byte_pacing);
                }
                None => {
                    if frame.is_empty() {
                        continue;
                    }
                    // The burst may just be slow; give it a moment.
                    std::thread::sleep(self.quiet_grace);
                    if self.link.bytes_pending() == 0 {
                        break;
                    }
                }
            }
        }
        if frame.is_empty() {
            return Ok(None);
        }
        if frame.len() >= FRAME_BUF_CAP {
            tracing::warn!("frame hit the {FRAME_BUF_CAP}-byte capture cap; truncating");
        }
        tracing::trace!("captured {} byte frame", frame.len());
        Ok(Some(frame))
    }

    fn reset(&mut self) -> Result<(), ReaderError> {
        let mut drained = 0usize;
        while self.link.read_byte()?.is_some() {
            drained += 1;
        }
        tracing::debug!("power-cycling reader, drained {drained} stale bytes");
        self.link.set_reset_line(LineLevel::Low)?;
        std::thread::sleep(self.reset_hold);
        self.link.set_reset_line(LineLevel::High)?;
        std::thread::sleep(self.reset_settle);
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────
