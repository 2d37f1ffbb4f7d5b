//! Multi-occupancy heuristics over occupant switches.
//!
//! A single-antenna reader cannot see two tags at once; two birds in the
//! box show up as the tag stream flip-flopping between them. The window
//! accumulates what one occupied stretch has shown:
//!
//! - **Distinct set**: every occupant seen since the box last went
//!   empty. Reaching [`DISTINCT_TAG_THRESHOLD`] members is evidence on
//!   its own.
//! - **Quick-change streak**: consecutive switches after sessions
//!   shorter than [`QUICK_CHANGE_MAX_SECS`]. A streak of
//!   [`QUICK_CHANGE_STREAK`] is evidence even when the same two tags
//!   alternate. Any slow switch breaks the streak.
//!
//! Demotion back to a single occupant is deliberately sluggish: it takes
//! a run of readings all showing the same bird and a quiet period with
//! no fresh evidence, so a brief pause in the flip-flop does not clear
//! the state.

use crate::types::{Monotonic, Occupant, Roster};

/// Sessions shorter than this count as a quick change (seconds).
pub const QUICK_CHANGE_MAX_SECS: u64 = 10;
/// Consecutive quick changes that alone declare multi-occupancy.
pub const QUICK_CHANGE_STREAK: u32 = 3;
/// Distinct occupants in one stretch that declare multi-occupancy.
pub const DISTINCT_TAG_THRESHOLD: usize = 2;
/// Same-occupant readings required before demotion is considered.
pub const SINGLE_READINGS_THRESHOLD: u32 = 10;
/// Quiet period with no fresh evidence before demotion (milliseconds).
pub const EVIDENCE_TIMEOUT_MS: u64 = 60_000;

/// Tuning for the multi-occupancy heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiPolicy {
    /// Quick-change session ceiling in seconds.
    pub quick_change_max_secs: u64,
    /// Streak length that declares on quick changes alone.
    pub quick_change_streak: u32,
    /// Distinct-occupant count that declares on its own.
    pub distinct_tag_threshold: usize,
    /// Same-occupant readings required before demotion.
    pub single_readings_threshold: u32,
    /// Evidence quiet period before demotion, in milliseconds.
    pub evidence_timeout_ms: u64,
}

impl Default for MultiPolicy {
    fn default() -> Self {
        Self {
            quick_change_max_secs: QUICK_CHANGE_MAX_SECS,
            quick_change_streak: QUICK_CHANGE_STREAK,
            distinct_tag_threshold: DISTINCT_TAG_THRESHOLD,
            single_readings_threshold: SINGLE_READINGS_THRESHOLD,
            evidence_timeout_ms: EVIDENCE_TIMEOUT_MS,
        }
    }
}

/// Evidence accumulated across one occupied stretch of the box.
///
/// Lives from the first entry until the box goes empty or the heuristic
/// demotes back to a single occupant; both ends clear it with
/// [`MultiWindow::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiWindow {
    distinct: Vec<Occupant>,
    quick_changes: u32,
    last_evidence: Option<Monotonic>,
    consecutive_single: u32,
}

impl MultiWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occupant switch and report whether the stretch now
    /// carries multi-occupancy evidence.
    ///
    /// Both occupants join the distinct set before evaluation, so a
    /// declaration always has at least the pair that triggered it.
    /// `session_secs` is how long the outgoing occupant held the box.
    pub fn observe_switch(
        &mut self,
        outgoing: &Occupant,
        incoming: &Occupant,
        session_secs: u64,
        policy: &MultiPolicy,
    ) -> bool {
        self.insert(outgoing);
        self.insert(incoming);
        if session_secs < policy.quick_change_max_secs {
            self.quick_changes = self.quick_changes.saturating_add(1);
        } else {
            self.quick_changes = 0;
        }
        self.quick_changes >= policy.quick_change_streak
            || self.distinct.len() >= policy.distinct_tag_threshold
    }

    /// Stamp fresh evidence and restart the demotion run.
    pub fn mark_evidence(&mut self, now: Monotonic) {
        self.last_evidence = Some(now);
        self.consecutive_single = 0;
    }

    /// Count one reading that showed only the current occupant.
    pub fn note_single_reading(&mut self) -> u32 {
        self.consecutive_single = self.consecutive_single.saturating_add(1);
        self.consecutive_single
    }

    /// Whether the demotion criteria hold: a long enough single-occupant
    /// run and strictly more than the quiet period since the last
    /// evidence.
    pub fn should_demote(&self, now: Monotonic, policy: &MultiPolicy) -> bool {
        self.consecutive_single >= policy.single_readings_threshold
            && self
                .last_evidence
                .is_none_or(|at| now.millis_since(at) > policy.evidence_timeout_ms)
    }

    /// Occupants seen this stretch, in first-seen order.
    pub fn occupants(&self) -> &[Occupant] {
        &self.distinct
    }

    pub fn quick_changes(&self) -> u32 {
        self.quick_changes
    }

    pub fn consecutive_single(&self) -> u32 {
        self.consecutive_single
    }

    pub fn reset(&mut self) {
        self.distinct.clear();
        self.quick_changes = 0;
        self.last_evidence = None;
        self.consecutive_single = 0;
    }

    fn insert(&mut self, occupant: &Occupant) {
        if self.distinct.len() < Roster::CAPACITY
            && !self.distinct.iter().any(|o| o.tag == occupant.tag)
        {
            self.distinct.push(occupant.clone());
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
