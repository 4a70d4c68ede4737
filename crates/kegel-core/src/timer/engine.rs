//! Phase timer engine.
//!
//! A second-granularity state machine for one 60-second round of alternating
//! contract/relax phases. It does not own a clock - the caller (normally a
//! [`TickDriver`](crate::driver::TickDriver)) invokes `tick()` once per
//! elapsed second while the round is running.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Contracting <-> Relaxing -> Completed -> Idle
//!              \            /
//!               -> Paused -
//! ```
//!
//! `reset()` returns to `Idle` from anywhere. `Completed` becomes `Idle` when
//! the presentation grace period ends and the caller invokes `settle()`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = PhaseEngine::new();
//! engine.start(PhaseDurations::new(3, 2)?);
//! // Once per second:
//! for event in engine.tick() { /* render / announce */ }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::phase::{Phase, PhaseDurations, ROUND_SECS};
use crate::error::ValidationError;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Contracting,
    Relaxing,
    Paused,
    /// Round finished; display holds the final state until `settle()`.
    Completed,
}

/// Core phase timer engine.
///
/// All commands are total: calls that make no sense in the current state
/// return `None` (or an empty event list) and leave the engine untouched.
///
/// Deserializing goes through the same checks the commands maintain, so a
/// restored engine always satisfies the countdown invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEngine")]
pub struct PhaseEngine {
    /// Durations of the current (or last) round. Frozen while running.
    durations: PhaseDurations,
    running: bool,
    paused: bool,
    /// Round ended and the grace period has not been settled yet.
    #[serde(default)]
    completed: bool,
    remaining_secs: u32,
    phase: Phase,
    /// Seconds since the last phase transition.
    phase_elapsed: u32,
    /// Contract+relax pairs finished in the current round.
    completed_cycles: u32,
    total_rounds: u64,
    total_secs: u64,
}

#[derive(Deserialize)]
struct RawEngine {
    durations: PhaseDurations,
    running: bool,
    paused: bool,
    #[serde(default)]
    completed: bool,
    remaining_secs: u32,
    phase: Phase,
    phase_elapsed: u32,
    completed_cycles: u32,
    total_rounds: u64,
    total_secs: u64,
}

impl TryFrom<RawEngine> for PhaseEngine {
    type Error = ValidationError;

    fn try_from(raw: RawEngine) -> Result<Self, Self::Error> {
        if raw.remaining_secs > ROUND_SECS {
            return Err(ValidationError::InvalidState(format!(
                "remaining_secs {} exceeds the {ROUND_SECS}s round",
                raw.remaining_secs
            )));
        }
        if raw.phase_elapsed >= raw.durations.of(raw.phase) {
            return Err(ValidationError::InvalidState(format!(
                "phase_elapsed {} does not fit a {}s {} phase",
                raw.phase_elapsed,
                raw.durations.of(raw.phase),
                raw.phase.label()
            )));
        }
        if raw.paused && !raw.running {
            return Err(ValidationError::InvalidState(
                "paused without a running round".into(),
            ));
        }
        if raw.completed && raw.running {
            return Err(ValidationError::InvalidState(
                "completed while still running".into(),
            ));
        }
        Ok(Self {
            durations: raw.durations,
            running: raw.running,
            paused: raw.paused,
            completed: raw.completed,
            remaining_secs: raw.remaining_secs,
            phase: raw.phase,
            phase_elapsed: raw.phase_elapsed,
            completed_cycles: raw.completed_cycles,
            total_rounds: raw.total_rounds,
            total_secs: raw.total_secs,
        })
    }
}

impl PhaseEngine {
    pub fn new() -> Self {
        Self::with_durations(PhaseDurations::default())
    }

    /// Idle engine whose next `toggle_pause()` start uses `durations`.
    pub fn with_durations(durations: PhaseDurations) -> Self {
        Self {
            durations,
            running: false,
            paused: false,
            completed: false,
            remaining_secs: ROUND_SECS,
            phase: Phase::Contracting,
            phase_elapsed: 0,
            completed_cycles: 0,
            total_rounds: 0,
            total_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        match (self.running, self.paused, self.completed) {
            (true, true, _) => TimerState::Paused,
            (true, false, _) => match self.phase {
                Phase::Contracting => TimerState::Contracting,
                Phase::Relaxing => TimerState::Relaxing,
            },
            (false, _, true) => TimerState::Completed,
            (false, _, false) => TimerState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the tick loop should currently be active.
    pub fn is_ticking(&self) -> bool {
        self.running && !self.paused
    }

    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_elapsed(&self) -> u32 {
        self.phase_elapsed
    }

    /// Seconds left in the current phase.
    pub fn phase_remaining_secs(&self) -> u32 {
        self.durations
            .of(self.phase)
            .saturating_sub(self.phase_elapsed)
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn total_rounds(&self) -> u64 {
        self.total_rounds
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn total_minutes(&self) -> u64 {
        self.total_secs / 60
    }

    /// 0.0 .. 100.0 progress through the current round.
    pub fn progress_pct(&self) -> f64 {
        f64::from(ROUND_SECS.saturating_sub(self.remaining_secs)) / f64::from(ROUND_SECS) * 100.0
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state(),
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            phase_remaining_secs: self.phase_remaining_secs(),
            completed_cycles: self.completed_cycles,
            planned_cycles: self.durations.planned_cycles(),
            total_rounds: self.total_rounds,
            total_minutes: self.total_minutes(),
            progress_pct: self.progress_pct(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new round. Ignored while a round is running (paused or not).
    pub fn start(&mut self, durations: PhaseDurations) -> Option<Event> {
        if self.running {
            return None;
        }
        self.durations = durations;
        self.running = true;
        self.paused = false;
        self.completed = false;
        self.remaining_secs = ROUND_SECS;
        self.phase = Phase::Contracting;
        self.phase_elapsed = 0;
        self.completed_cycles = 0;
        tracing::info!(
            contract_secs = durations.contract_secs(),
            relax_secs = durations.relax_secs(),
            "round started"
        );
        Some(Event::RoundStarted {
            durations,
            planned_cycles: durations.planned_cycles(),
            at: Utc::now(),
        })
    }

    /// Suspend the countdown. Strict: does nothing unless running and not paused.
    pub fn pause(&mut self) -> Option<Event> {
        if !self.is_ticking() {
            return None;
        }
        self.paused = true;
        tracing::debug!(remaining_secs = self.remaining_secs, "round paused");
        Some(Event::Paused {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if !(self.running && self.paused) {
            return None;
        }
        self.paused = false;
        tracing::debug!(remaining_secs = self.remaining_secs, "round resumed");
        Some(Event::Resumed {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Single pause/continue button: pauses a ticking round, resumes a paused
    /// one, and starts a new round with the last durations when idle.
    pub fn toggle_pause(&mut self) -> Option<Event> {
        match (self.running, self.paused) {
            (true, false) => self.pause(),
            (true, true) => self.resume(),
            (false, _) => self.start(self.durations),
        }
    }

    /// Host surface hidden. Same path as `pause()`.
    pub fn hide(&mut self) -> Option<Event> {
        self.pause()
    }

    /// Back to a fresh idle round. Lifetime totals are kept.
    pub fn reset(&mut self) -> Option<Event> {
        self.running = false;
        self.paused = false;
        self.completed = false;
        self.remaining_secs = ROUND_SECS;
        self.phase = Phase::Contracting;
        self.phase_elapsed = 0;
        self.completed_cycles = 0;
        tracing::debug!("round reset");
        Some(Event::Reset { at: Utc::now() })
    }

    /// End the post-completion grace period.
    pub fn settle(&mut self) -> Option<Event> {
        if !self.completed || self.running {
            return None;
        }
        self.completed = false;
        self.remaining_secs = ROUND_SECS;
        self.phase = Phase::Contracting;
        self.phase_elapsed = 0;
        Some(Event::RoundSettled { at: Utc::now() })
    }

    /// Replace the durations used by the next round. Refused mid-round.
    pub fn set_durations(&mut self, durations: PhaseDurations) -> bool {
        if self.running {
            return false;
        }
        self.durations = durations;
        true
    }

    /// Advance one second. Call only while the tick loop is active; returns no
    /// events otherwise.
    pub fn tick(&mut self) -> Vec<Event> {
        if !self.is_ticking() {
            return Vec::new();
        }
        if self.remaining_secs == 0 {
            return vec![self.complete()];
        }

        self.remaining_secs -= 1;
        self.total_secs += 1;
        self.phase_elapsed += 1;

        let mut events = Vec::with_capacity(2);
        let boundary = self.phase_elapsed % self.durations.cycle_len();
        match self.phase {
            Phase::Contracting if boundary == self.durations.contract_secs() => {
                self.phase = Phase::Relaxing;
                self.phase_elapsed = 0;
                events.push(self.phase_entered(true));
            }
            Phase::Relaxing if boundary == self.durations.relax_secs() => {
                self.phase = Phase::Contracting;
                self.phase_elapsed = 0;
                self.completed_cycles += 1;
                let announce = self.remaining_secs > 0;
                events.push(self.phase_entered(announce));
            }
            _ => {}
        }

        events.push(Event::DisplayUpdate {
            remaining_secs: self.remaining_secs,
            phase: self.phase,
            phase_remaining_secs: self.phase_remaining_secs(),
            total_minutes: self.total_minutes(),
            progress_pct: self.progress_pct(),
            at: Utc::now(),
        });
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn phase_entered(&self, announce: bool) -> Event {
        Event::PhaseEntered {
            phase: self.phase,
            completed_cycles: self.completed_cycles,
            remaining_secs: self.remaining_secs,
            announce,
            at: Utc::now(),
        }
    }

    fn complete(&mut self) -> Event {
        self.running = false;
        self.paused = false;
        self.completed = true;
        self.total_rounds += 1;
        tracing::info!(
            total_rounds = self.total_rounds,
            completed_cycles = self.completed_cycles,
            "round complete"
        );
        Event::RoundCompleted {
            total_rounds: self.total_rounds,
            completed_cycles: self.completed_cycles,
            at: Utc::now(),
        }
    }
}

impl Default for PhaseEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn durations(contract: u32, relax: u32) -> PhaseDurations {
        PhaseDurations::new(contract, relax).unwrap()
    }

    /// Tick until the round completes; returns the number of ticks issued.
    fn run_round(engine: &mut PhaseEngine) -> (u32, Vec<Event>) {
        let mut ticks = 0;
        let mut events = Vec::new();
        while engine.is_running() {
            events.extend(engine.tick());
            ticks += 1;
            assert!(ticks <= ROUND_SECS + 1, "round never completed");
        }
        (ticks, events)
    }

    #[test]
    fn new_engine_is_idle_with_full_round() {
        let engine = PhaseEngine::new();
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 60);
        assert_eq!(engine.phase(), Phase::Contracting);
        assert_eq!(engine.total_rounds(), 0);
    }

    #[test]
    fn start_pause_resume() {
        let mut engine = PhaseEngine::new();
        assert!(engine.start(durations(3, 2)).is_some());
        assert_eq!(engine.state(), TimerState::Contracting);

        assert!(engine.pause().is_some());
        assert_eq!(engine.state(), TimerState::Paused);

        assert!(engine.resume().is_some());
        assert_eq!(engine.state(), TimerState::Contracting);
    }

    #[test]
    fn start_is_ignored_while_running() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(3, 2));
        engine.tick();
        assert!(engine.start(durations(5, 5)).is_none());
        assert_eq!(engine.durations(), durations(3, 2));
        assert_eq!(engine.remaining_secs(), 59);
    }

    #[test]
    fn pause_is_noop_when_idle() {
        let mut engine = PhaseEngine::new();
        assert!(engine.pause().is_none());
        assert!(engine.resume().is_none());
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn toggle_pause_starts_pauses_and_resumes() {
        let mut engine = PhaseEngine::with_durations(durations(4, 4));
        assert!(matches!(
            engine.toggle_pause(),
            Some(Event::RoundStarted { .. })
        ));
        assert_eq!(engine.durations(), durations(4, 4));
        assert!(matches!(engine.toggle_pause(), Some(Event::Paused { .. })));
        assert!(matches!(engine.toggle_pause(), Some(Event::Resumed { .. })));
        assert!(engine.is_ticking());
    }

    #[test]
    fn paused_engine_ignores_ticks() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(3, 2));
        engine.tick();
        engine.pause();
        assert!(engine.tick().is_empty());
        assert_eq!(engine.remaining_secs(), 59);
        assert_eq!(engine.total_secs(), 1);
    }

    #[test]
    fn hide_pauses_ticking_round_only() {
        let mut engine = PhaseEngine::new();
        assert!(engine.hide().is_none());
        engine.start(durations(3, 2));
        assert!(engine.hide().is_some());
        assert!(engine.is_paused());
        assert!(engine.hide().is_none());
    }

    #[test]
    fn contract_two_relax_one_phase_sequence() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(2, 1));
        let mut phases = Vec::new();
        let mut cycles = Vec::new();
        for _ in 0..6 {
            engine.tick();
            phases.push(engine.phase());
            cycles.push(engine.completed_cycles());
        }
        use Phase::*;
        assert_eq!(
            phases,
            vec![Contracting, Relaxing, Contracting, Contracting, Relaxing, Contracting]
        );
        assert_eq!(cycles, vec![0, 0, 1, 1, 1, 2]);
    }

    #[test]
    fn display_update_reports_phase_countdown() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(3, 2));
        let events = engine.tick();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::DisplayUpdate {
                remaining_secs,
                phase,
                phase_remaining_secs,
                ..
            } => {
                assert_eq!(*remaining_secs, 59);
                assert_eq!(*phase, Phase::Contracting);
                assert_eq!(*phase_remaining_secs, 2);
            }
            other => panic!("Expected DisplayUpdate, got {other:?}"),
        }

        engine.tick();
        let events = engine.tick();
        assert!(matches!(
            events[0],
            Event::PhaseEntered {
                phase: Phase::Relaxing,
                announce: true,
                ..
            }
        ));
        assert!(matches!(
            events[1],
            Event::DisplayUpdate {
                phase: Phase::Relaxing,
                phase_remaining_secs: 2,
                ..
            }
        ));
    }

    #[test]
    fn round_completes_on_tick_after_zero() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(7, 5));
        for _ in 0..60 {
            engine.tick();
        }
        assert_eq!(engine.remaining_secs(), 0);
        assert!(engine.is_running());

        let events = engine.tick();
        assert!(matches!(
            events.as_slice(),
            [Event::RoundCompleted { total_rounds: 1, .. }]
        ));
        assert_eq!(engine.state(), TimerState::Completed);
        assert!(engine.tick().is_empty());
        assert_eq!(engine.total_rounds(), 1);
    }

    #[test]
    fn final_second_boundary_is_not_announced() {
        // 3 + 2 divides 60: the last relax phase ends on the last second.
        let mut engine = PhaseEngine::new();
        engine.start(durations(3, 2));
        let (ticks, events) = run_round(&mut engine);
        assert_eq!(ticks, 61);

        let last_entry = events
            .iter()
            .filter(|e| matches!(e, Event::PhaseEntered { .. }))
            .last()
            .unwrap();
        assert!(matches!(
            last_entry,
            Event::PhaseEntered {
                phase: Phase::Contracting,
                remaining_secs: 0,
                announce: false,
                completed_cycles: 12,
                ..
            }
        ));
        assert_eq!(last_entry.cue(), None);
        assert_eq!(engine.completed_cycles(), 12);
    }

    #[test]
    fn reset_keeps_lifetime_totals() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(2, 1));
        for _ in 0..10 {
            engine.tick();
        }
        assert!(engine.reset().is_some());
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 60);
        assert_eq!(engine.phase(), Phase::Contracting);
        assert_eq!(engine.phase_elapsed(), 0);
        assert_eq!(engine.completed_cycles(), 0);
        assert_eq!(engine.total_secs(), 10);
    }

    #[test]
    fn settle_returns_completed_round_to_idle() {
        let mut engine = PhaseEngine::new();
        assert!(engine.settle().is_none());
        engine.start(durations(3, 2));
        run_round(&mut engine);
        assert_eq!(engine.remaining_secs(), 0);

        assert!(engine.settle().is_some());
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 60);
        assert!(engine.settle().is_none());
    }

    #[test]
    fn start_during_grace_period_begins_next_round() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(3, 2));
        run_round(&mut engine);
        assert!(engine.start(durations(3, 2)).is_some());
        assert_eq!(engine.state(), TimerState::Contracting);
        assert_eq!(engine.remaining_secs(), 60);
        assert!(engine.settle().is_none());
        assert_eq!(engine.total_rounds(), 1);
        assert_eq!(engine.total_secs(), 60);
    }

    #[test]
    fn set_durations_refused_mid_round() {
        let mut engine = PhaseEngine::new();
        assert!(engine.set_durations(durations(5, 5)));
        engine.start(durations(5, 5));
        assert!(!engine.set_durations(durations(1, 1)));
        engine.pause();
        assert!(!engine.set_durations(durations(1, 1)));
        assert_eq!(engine.durations(), durations(5, 5));
    }

    #[test]
    fn total_minutes_accumulate_across_rounds() {
        let mut engine = PhaseEngine::new();
        for _ in 0..3 {
            engine.start(durations(3, 2));
            run_round(&mut engine);
        }
        assert_eq!(engine.total_rounds(), 3);
        assert_eq!(engine.total_secs(), 180);
        assert_eq!(engine.total_minutes(), 3);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let engine = PhaseEngine::new();
        match engine.snapshot() {
            Event::StateSnapshot {
                state,
                remaining_secs,
                planned_cycles,
                progress_pct,
                ..
            } => {
                assert_eq!(state, TimerState::Idle);
                assert_eq!(remaining_secs, 60);
                assert_eq!(planned_cycles, 12);
                assert_eq!(progress_pct, 0.0);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }

    #[test]
    fn engine_json_roundtrip_mid_round() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(4, 3));
        for _ in 0..9 {
            engine.tick();
        }
        let json = serde_json::to_string(&engine).unwrap();
        let restored: PhaseEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, engine);
    }

    #[test]
    fn deserialize_rejects_broken_invariants() {
        let mut engine = PhaseEngine::new();
        engine.start(durations(4, 3));
        engine.tick();
        let valid = serde_json::to_value(&engine).unwrap();

        let mut value = valid.clone();
        value["remaining_secs"] = serde_json::json!(500);
        let err = serde_json::from_value::<PhaseEngine>(value).unwrap_err();
        assert!(err.to_string().contains("remaining_secs 500"));

        let mut value = valid.clone();
        value["phase_elapsed"] = serde_json::json!(4);
        assert!(serde_json::from_value::<PhaseEngine>(value).is_err());

        let mut value = valid.clone();
        value["running"] = serde_json::json!(false);
        value["paused"] = serde_json::json!(true);
        assert!(serde_json::from_value::<PhaseEngine>(value).is_err());

        let mut value = valid;
        value["completed"] = serde_json::json!(true);
        assert!(serde_json::from_value::<PhaseEngine>(value).is_err());
    }
}
