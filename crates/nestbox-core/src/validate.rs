//! Read debouncing: turns a stream of decoded tags into accepted readings.
//!
//! Tag readers re-broadcast a card many times per pass and occasionally
//! misread a digit. The validator counts consecutive sightings of the
//! same tag inside a short repeat window and accepts a reading once the
//! count meets the configured threshold. A differing tag, or the same
//! tag after the window lapses, restarts the count at one.
//!
//! State must be cleared whenever the reader hardware is reset, since a
//! fresh scan cycle says nothing about what the stale one saw.

use crate::types::{Monotonic, TagId, TagReading};

/// Two decodes of the same tag within this window count as one pass.
pub const REPEAT_WINDOW_MS: u64 = 2_000;
/// Consecutive in-window sightings required before a reading is accepted.
pub const ACCEPT_THRESHOLD: u32 = 1;

/// Tuning for [`ReadValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Repeat window in milliseconds.
    pub repeat_window_ms: u64,
    /// Sightings required to accept. A threshold of one accepts every
    /// decoded tag immediately.
    pub accept_threshold: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            repeat_window_ms: REPEAT_WINDOW_MS,
            accept_threshold: ACCEPT_THRESHOLD,
        }
    }
}

/// Consecutive-sighting debouncer over decoded tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadValidator {
    config: ValidatorConfig,
    last_tag: Option<TagId>,
    last_seen: Monotonic,
    consecutive: u32,
}

impl ReadValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            last_tag: None,
            last_seen: Monotonic::ZERO,
            consecutive: 0,
        }
    }

    /// Feed one decoded tag. Returns an accepted reading once the
    /// consecutive count reaches the threshold; the last-seen instant is
    /// updated on every call, so the repeat window slides with traffic.
    pub fn observe(&mut self, tag: TagId, now: Monotonic) -> Option<TagReading> {
        let repeat = self.last_tag.as_ref() == Some(&tag)
            && now.millis_since(self.last_seen) < self.config.repeat_window_ms;
        if repeat {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.consecutive = 1;
            self.last_tag = Some(tag.clone());
        }
        self.last_seen = now;
        (self.consecutive >= self.config.accept_threshold)
            .then_some(TagReading { tag, accepted_at: now })
    }

    /// Forget the sighting streak. Call after a reader reset; the next
    /// tag must re-earn acceptance from scratch.
    pub fn reset(&mut self) {
        self.last_tag = None;
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

// ─── Tests ────────────────────────────────────────────────────────
