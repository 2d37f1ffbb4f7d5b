//! Occupancy inference state machine.
//!
//! Tracks one nesting box through `empty`, `single`, and `multi`
//! occupancy from the accepted reading stream, and emits the externally
//! visible [`NestEvent`]s for every transition:
//!
//! - **Entry**: a reading while empty starts a session.
//! - **Hand-off**: a differing reading that the multi heuristic calls
//!   calm closes the sitting bird's visit and starts the newcomer's.
//! - **Multi episode**: evidence from [`MultiWindow`] promotes to
//!   `multi`; a long same-bird run with stale evidence demotes back.
//! - **Departure**: RFID has no exit signal, so absence is inferred. A
//!   probe power-cycles the reader after a quiet period; a bird still
//!   sitting re-broadcasts within the confirmation window, and silence
//!   past the deadline closes the visit and empties the box.
//!
//! The engine is deliberately I/O-free: callers feed it monotonic
//! instants and resolved readings, execute the reset it requests, and
//! report completion via [`OccupancyEngine::note_rearmed`]. Everything
//! else is pure bookkeeping, which keeps the transition table testable
//! at millisecond precision.

use crate::multi::{MultiPolicy, MultiWindow};
use crate::types::{Monotonic, NestEvent, Occupant, OccupancyMode};

/// Quiet period while occupied before the liveness probe fires
/// (milliseconds).
pub const PRESENCE_CHECK_PERIOD_MS: u64 = 30_000;
/// Window after a probe reset completes in which the occupant must
/// re-broadcast (milliseconds).
pub const CONFIRMATION_WINDOW_MS: u64 = 8_000;

/// Tuning for [`OccupancyEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Probe period in milliseconds.
    pub presence_check_period_ms: u64,
    /// Confirmation window in milliseconds.
    pub confirmation_window_ms: u64,
    /// Multi-occupancy heuristic tuning.
    pub multi: MultiPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            presence_check_period_ms: PRESENCE_CHECK_PERIOD_MS,
            confirmation_window_ms: CONFIRMATION_WINDOW_MS,
            multi: MultiPolicy::default(),
        }
    }
}

/// What one engine step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutput {
    /// Events to publish, in emission order.
    pub events: Vec<NestEvent>,
    /// The caller should power-cycle the reader now and report back
    /// through [`OccupancyEngine::note_rearmed`] once it settles.
    pub reset_requested: bool,
}

impl TickOutput {
    fn emit(event: NestEvent) -> Self {
        Self { events: vec![event], reset_requested: false }
    }
}

/// Occupancy state machine for one box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyEngine {
    config: EngineConfig,
    mode: OccupancyMode,
    /// Most recently read occupant; `None` exactly while empty.
    current: Option<Occupant>,
    /// When the current occupant's session began. Restarts on every
    /// occupant change, including switches inside a multi episode.
    session_start: Monotonic,
    /// Last proof of presence: any resolved reading, or probe rearm.
    last_presence_check: Monotonic,
    /// A probe reset is in flight or its confirmation window is open.
    awaiting_confirmation: bool,
    /// Armed by [`OccupancyEngine::note_rearmed`]; silence past this
    /// instant means the box emptied.
    confirmation_deadline: Option<Monotonic>,
    window: MultiWindow,
}

impl OccupancyEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            mode: OccupancyMode::Empty,
            current: None,
            session_start: Monotonic::ZERO,
            last_presence_check: Monotonic::ZERO,
            awaiting_confirmation: false,
            confirmation_deadline: None,
            window: MultiWindow::new(),
        }
    }

    pub fn mode(&self) -> OccupancyMode {
        self.mode
    }

    pub fn current_occupant(&self) -> Option<&Occupant> {
        self.current.as_ref()
    }

    pub fn awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation
    }

    // ─── Timers ───────────────────────────────────────────────────

    /// Advance the probe and confirmation timers without a reading.
    pub fn poll(&mut self, now: Monotonic) -> TickOutput {
        if self.mode == OccupancyMode::Empty {
            return TickOutput::default();
        }
        if !self.awaiting_confirmation
            && now.millis_since(self.last_presence_check) > self.config.presence_check_period_ms
        {
            // Probe: a sitting bird re-broadcasts once the reader's scan
            // cycle restarts; an empty box stays silent.
            self.awaiting_confirmation = true;
            self.confirmation_deadline = None;
            return TickOutput { events: Vec::new(), reset_requested: true };
        }
        if self.awaiting_confirmation
            && self.confirmation_deadline.is_some_and(|d| now.millis_since(d) > 0)
        {
            return self.depart(now);
        }
        TickOutput::default()
    }

    /// Report that the requested reader reset has completed. Arms the
    /// confirmation deadline and restarts the probe period from the
    /// completion instant, not from when the probe fired.
    pub fn note_rearmed(&mut self, now: Monotonic) {
        if !self.awaiting_confirmation {
            return;
        }
        self.confirmation_deadline = Some(now.plus_millis(self.config.confirmation_window_ms));
        self.last_presence_check = now;
    }

    // ─── Readings ─────────────────────────────────────────────────

    /// Consume one accepted, roster-resolved reading.
    pub fn observe(&mut self, occupant: &Occupant, now: Monotonic) -> TickOutput {
        // Any reading is proof of presence and settles an open probe.
        self.last_presence_check = now;
        self.awaiting_confirmation = false;
        self.confirmation_deadline = None;

        match self.mode {
            OccupancyMode::Empty => self.enter(occupant, now),
            _ if self.current.as_ref().is_some_and(|c| c.tag == occupant.tag) => {
                self.same_occupant(occupant, now)
            }
            OccupancyMode::Single => self.switch_from_single(occupant, now),
            OccupancyMode::Multi => self.switch_in_multi(occupant, now),
        }
    }

    fn enter(&mut self, occupant: &Occupant, now: Monotonic) -> TickOutput {
        self.mode = OccupancyMode::Single;
        self.current = Some(occupant.clone());
        self.session_start = now;
        TickOutput::emit(NestEvent::Entered { occupant: occupant.clone() })
    }

    fn same_occupant(&mut self, occupant: &Occupant, now: Monotonic) -> TickOutput {
        if self.mode != OccupancyMode::Multi {
            return TickOutput::default();
        }
        self.window.note_single_reading();
        if !self.window.should_demote(now, &self.config.multi) {
            return TickOutput::default();
        }
        // A long same-bird run with stale evidence: the others have left.
        self.window.reset();
        self.mode = OccupancyMode::Single;
        TickOutput::emit(NestEvent::ReturnedToSingle { occupant: occupant.clone() })
    }

    fn switch_from_single(&mut self, incoming: &Occupant, now: Monotonic) -> TickOutput {
        let Some(outgoing) = self.current.take() else {
            // Single always has a current occupant; recover as an entry.
            return self.enter(incoming, now);
        };
        let session_secs = now.secs_since(self.session_start);
        let evidence =
            self.window.observe_switch(&outgoing, incoming, session_secs, &self.config.multi);
        self.current = Some(incoming.clone());
        self.session_start = now;
        if evidence {
            self.mode = OccupancyMode::Multi;
            self.window.mark_evidence(now);
            TickOutput::emit(NestEvent::MultiOccupantDetected {
                occupants: self.window.occupants().to_vec(),
            })
        } else {
            TickOutput {
                events: vec![
                    NestEvent::VisitCompleted {
                        occupant: outgoing.clone(),
                        duration_secs: session_secs,
                    },
                    NestEvent::Changed {
                        previous: outgoing,
                        new: incoming.clone(),
                        previous_duration_secs: session_secs,
                    },
                ],
                reset_requested: false,
            }
        }
    }

    fn switch_in_multi(&mut self, incoming: &Occupant, now: Monotonic) -> TickOutput {
        let Some(outgoing) = self.current.take() else {
            return self.enter(incoming, now);
        };
        let session_secs = now.secs_since(self.session_start);
        // The verdict is not consulted: an established episode only ends
        // through demotion, never because one switch looked calm.
        self.window.observe_switch(&outgoing, incoming, session_secs, &self.config.multi);
        self.window.mark_evidence(now);
        self.current = Some(incoming.clone());
        self.session_start = now;
        TickOutput::emit(NestEvent::MultiOccupantContinued {
            occupants: self.window.occupants().to_vec(),
        })
    }

    // ─── Departure ────────────────────────────────────────────────

    fn depart(&mut self, now: Monotonic) -> TickOutput {
        let mut events = Vec::with_capacity(2);
        if let Some(occupant) = self.current.take() {
            events.push(NestEvent::VisitCompleted {
                occupant,
                duration_secs: now.secs_since(self.session_start),
            });
        }
        events.push(NestEvent::Emptied);
        self.mode = OccupancyMode::Empty;
        self.awaiting_confirmation = false;
        self.confirmation_deadline = None;
        self.window.reset();
        TickOutput { events, reset_requested: false }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagId;

    fn occupant(tag: &str, name: &str, number: u8) -> Occupant {
        Occupant {
            tag: TagId::new(tag).expect("valid tag"),
            name: name.to_string(),
            number,
        }
    }

    fn willow() -> Occupant {
        occupant("02003E98C8", "Willow", 1)
    }

    fn hazel() -> Occupant {
        occupant("02002D5A4A", "Hazel", 2)
    }

    fn clover() -> Occupant {
        occupant("02004C1F33", "Clover", 3)
    }

    fn at(ms: u64) -> Monotonic {
        Monotonic::from_millis(ms)
    }

    fn engine() -> OccupancyEngine {
        OccupancyEngine::new(EngineConfig::default())
    }

    /// Config whose distinct-set path stays quiet at two birds, so calm
    /// hand-offs are reachable and streak behavior is observable.
    fn loose() -> OccupancyEngine {
        OccupancyEngine::new(EngineConfig {
            multi: MultiPolicy { distinct_tag_threshold: 3, ..MultiPolicy::default() },
            ..EngineConfig::default()
        })
    }

    fn kinds(out: &TickOutput) -> Vec<&'static str> {
        out.events.iter().map(NestEvent::kind).collect()
    }

    // ── 1. Entry ────────────────────────────────────────────────────

    #[test]
    fn starts_empty() {
        let e = engine();
        assert_eq!(e.mode(), OccupancyMode::Empty);
        assert!(e.current_occupant().is_none());
        assert!(!e.awaiting_confirmation());
    }

    #[test]
    fn first_reading_enters_single() {
        let mut e = engine();
        let out = e.observe(&willow(), at(1_000));
        assert_eq!(out.events, vec![NestEvent::Entered { occupant: willow() }]);
        assert!(!out.reset_requested);
        assert_eq!(e.mode(), OccupancyMode::Single);
        assert_eq!(e.current_occupant(), Some(&willow()));
    }

    #[test]
    fn repeat_reading_is_quiet() {
        let mut e = engine();
        e.observe(&willow(), at(1_000));
        let out = e.observe(&willow(), at(3_000));
        assert!(out.events.is_empty());
        assert_eq!(e.mode(), OccupancyMode::Single);
    }

    // ── 2. Probe cycle ──────────────────────────────────────────────

    #[test]
    fn probe_fires_strictly_after_quiet_period() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        assert!(!e.poll(at(PRESENCE_CHECK_PERIOD_MS)).reset_requested);
        let out = e.poll(at(PRESENCE_CHECK_PERIOD_MS + 1));
        assert!(out.reset_requested);
        assert!(out.events.is_empty());
        assert!(e.awaiting_confirmation());
    }

    #[test]
    fn probe_never_fires_while_empty() {
        let mut e = engine();
        let out = e.poll(at(600_000));
        assert!(!out.reset_requested);
        assert!(out.events.is_empty());
    }

    #[test]
    fn probe_does_not_refire_before_rearm() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        assert!(e.poll(at(30_001)).reset_requested);
        assert!(!e.poll(at(32_000)).reset_requested);
        assert!(e.poll(at(32_000)).events.is_empty());
    }

    #[test]
    fn reading_after_rearm_confirms_presence() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        assert!(e.poll(at(30_001)).reset_requested);
        e.note_rearmed(at(31_500));
        let out = e.observe(&willow(), at(35_000));
        assert!(out.events.is_empty());
        assert!(!e.awaiting_confirmation());
        // No departure once the deadline would have lapsed.
        assert!(e.poll(at(45_000)).events.is_empty());
        assert_eq!(e.mode(), OccupancyMode::Single);
        // The probe period restarted from the confirming reading.
        assert!(!e.poll(at(65_000)).reset_requested);
        assert!(e.poll(at(65_001)).reset_requested);
    }

    #[test]
    fn rearm_without_pending_probe_is_ignored() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        e.note_rearmed(at(5_000));
        // The probe period still counts from the reading.
        assert!(!e.poll(at(30_000)).reset_requested);
        assert!(e.poll(at(30_001)).reset_requested);
    }

    // ── 3. Departure ────────────────────────────────────────────────

    #[test]
    fn silence_past_deadline_completes_visit() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        assert!(e.poll(at(30_001)).reset_requested);
        e.note_rearmed(at(31_500));
        assert!(e.poll(at(39_500)).events.is_empty());
        let out = e.poll(at(39_501));
        assert_eq!(
            out.events,
            vec![
                NestEvent::VisitCompleted { occupant: willow(), duration_secs: 39 },
                NestEvent::Emptied,
            ]
        );
        assert_eq!(e.mode(), OccupancyMode::Empty);
        assert!(e.current_occupant().is_none());
        assert!(!e.awaiting_confirmation());
    }

    #[test]
    fn departure_duration_counts_from_session_start() {
        let mut e = engine();
        e.observe(&willow(), at(2_000));
        assert!(e.poll(at(32_001)).reset_requested);
        e.note_rearmed(at(33_000));
        let out = e.poll(at(41_001));
        // 2_000 .. 41_001 floor-truncates to 39 whole seconds.
        assert_eq!(
            out.events[0],
            NestEvent::VisitCompleted { occupant: willow(), duration_secs: 39 }
        );
    }

    // ── 4. Hand-off ─────────────────────────────────────────────────

    #[test]
    fn calm_switch_hands_off() {
        let mut e = loose();
        e.observe(&willow(), at(0));
        let out = e.observe(&hazel(), at(20_000));
        assert_eq!(
            out.events,
            vec![
                NestEvent::VisitCompleted { occupant: willow(), duration_secs: 20 },
                NestEvent::Changed {
                    previous: willow(),
                    new: hazel(),
                    previous_duration_secs: 20,
                },
            ]
        );
        assert_eq!(e.mode(), OccupancyMode::Single);
        assert_eq!(e.current_occupant(), Some(&hazel()));
    }

    #[test]
    fn handoff_restarts_session_clock() {
        let mut e = loose();
        e.observe(&willow(), at(0));
        e.observe(&hazel(), at(20_000));
        let out = e.observe(&willow(), at(50_000));
        assert_eq!(
            out.events[0],
            NestEvent::VisitCompleted { occupant: hazel(), duration_secs: 30 }
        );
    }

    #[test]
    fn handoff_duration_floor_truncates() {
        let mut e = loose();
        e.observe(&willow(), at(500));
        let out = e.observe(&hazel(), at(15_499));
        assert_eq!(
            out.events[0],
            NestEvent::VisitCompleted { occupant: willow(), duration_secs: 14 }
        );
    }

    // ── 5. Multi detection ──────────────────────────────────────────

    #[test]
    fn default_policy_declares_multi_on_any_switch() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        let out = e.observe(&hazel(), at(60_000));
        assert_eq!(
            out.events,
            vec![NestEvent::MultiOccupantDetected { occupants: vec![willow(), hazel()] }]
        );
        assert_eq!(e.mode(), OccupancyMode::Multi);
        assert_eq!(e.current_occupant(), Some(&hazel()));
    }

    #[test]
    fn quick_alternation_declares_by_third_switch() {
        let mut e = loose();
        e.observe(&willow(), at(0));
        assert_eq!(kinds(&e.observe(&hazel(), at(3_000))), ["visit_completed", "changed"]);
        assert_eq!(kinds(&e.observe(&willow(), at(6_000))), ["visit_completed", "changed"]);
        let out = e.observe(&hazel(), at(9_000));
        assert_eq!(
            out.events,
            vec![NestEvent::MultiOccupantDetected { occupants: vec![willow(), hazel()] }]
        );
        assert_eq!(e.mode(), OccupancyMode::Multi);
    }

    #[test]
    fn multi_alternation_continues_episode() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        e.observe(&hazel(), at(10_000));
        let out = e.observe(&willow(), at(12_000));
        assert_eq!(
            out.events,
            vec![NestEvent::MultiOccupantContinued { occupants: vec![willow(), hazel()] }]
        );
        let out = e.observe(&hazel(), at(14_000));
        assert_eq!(kinds(&out), ["multi_occupant_continued"]);
        assert_eq!(e.mode(), OccupancyMode::Multi);
    }

    #[test]
    fn third_bird_joins_episode() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        e.observe(&hazel(), at(10_000));
        let out = e.observe(&clover(), at(20_000));
        assert_eq!(
            out.events,
            vec![NestEvent::MultiOccupantContinued {
                occupants: vec![willow(), hazel(), clover()],
            }]
        );
    }

    // ── 6. Multi demotion ───────────────────────────────────────────

    #[test]
    fn quiet_same_bird_run_demotes() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        e.observe(&hazel(), at(10_000));
        // Ten quiet readings: the run completes before the evidence
        // window does, so the episode holds.
        for i in 1..=10 {
            let out = e.observe(&hazel(), at(10_000 + i * 5_000));
            assert!(out.events.is_empty(), "reading {i} should be quiet");
        }
        assert_eq!(e.mode(), OccupancyMode::Multi);
        // The eleventh lands past the evidence timeout.
        let out = e.observe(&hazel(), at(75_000));
        assert_eq!(out.events, vec![NestEvent::ReturnedToSingle { occupant: hazel() }]);
        assert_eq!(e.mode(), OccupancyMode::Single);
    }

    #[test]
    fn alternation_restarts_demotion_run() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        e.observe(&hazel(), at(10_000));
        for i in 1..=9 {
            e.observe(&hazel(), at(10_000 + i * 1_000));
        }
        // A switch resets the run and refreshes evidence.
        assert_eq!(kinds(&e.observe(&willow(), at(21_000))), ["multi_occupant_continued"]);
        for i in 1..=10 {
            let out = e.observe(&willow(), at(21_000 + i * 1_000));
            assert!(out.events.is_empty(), "reading {i} should be quiet");
        }
        // Run complete but evidence only 11s stale.
        assert_eq!(e.mode(), OccupancyMode::Multi);
    }

    #[test]
    fn demoted_engine_can_declare_again() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        e.observe(&hazel(), at(10_000));
        for i in 1..=10 {
            e.observe(&hazel(), at(60_000 + i * 2_000));
        }
        assert_eq!(e.mode(), OccupancyMode::Single);
        // The cleared window seeds afresh on the next switch.
        let out = e.observe(&willow(), at(90_000));
        assert_eq!(
            out.events,
            vec![NestEvent::MultiOccupantDetected { occupants: vec![hazel(), willow()] }]
        );
    }

    // ── 7. Multi departure ──────────────────────────────────────────

    #[test]
    fn multi_departure_reports_last_known_occupant() {
        let mut e = engine();
        e.observe(&willow(), at(0));
        e.observe(&hazel(), at(10_000));
        assert!(e.poll(at(40_001)).reset_requested);
        e.note_rearmed(at(41_000));
        let out = e.poll(at(49_001));
        assert_eq!(
            out.events,
            vec![
                NestEvent::VisitCompleted { occupant: hazel(), duration_secs: 39 },
                NestEvent::Emptied,
            ]
        );
        assert_eq!(e.mode(), OccupancyMode::Empty);
        // The evidence window died with the episode: re-entry is single.
        let out = e.observe(&willow(), at(60_000));
        assert_eq!(kinds(&out), ["entered"]);
        assert_eq!(e.mode(), OccupancyMode::Single);
    }
}
