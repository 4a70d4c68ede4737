use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, PhaseDurations, TimerState};

/// Every state change of the engine produces an Event.
/// The presentation layer renders them; the voice layer turns some into cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    RoundStarted {
        durations: PhaseDurations,
        planned_cycles: u32,
        at: DateTime<Utc>,
    },
    /// Phase boundary crossed during a tick.
    PhaseEntered {
        phase: Phase,
        completed_cycles: u32,
        remaining_secs: u32,
        /// False when the boundary coincides with the last second of the round.
        announce: bool,
        at: DateTime<Utc>,
    },
    DisplayUpdate {
        remaining_secs: u32,
        phase: Phase,
        phase_remaining_secs: u32,
        total_minutes: u64,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
    Paused {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    Resumed {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    RoundCompleted {
        total_rounds: u64,
        completed_cycles: u32,
        at: DateTime<Utc>,
    },
    Reset {
        at: DateTime<Utc>,
    },
    /// Post-completion grace period is over; display is back to a full round.
    RoundSettled {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: Phase,
        remaining_secs: u32,
        phase_remaining_secs: u32,
        completed_cycles: u32,
        planned_cycles: u32,
        total_rounds: u64,
        total_minutes: u64,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}

/// Phrase keys understood by the voice layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    RoundStart,
    EnterRelax,
    EnterContract,
    RoundComplete,
}

impl Event {
    /// The spoken cue for this event, if it has one.
    pub fn cue(&self) -> Option<Cue> {
        match self {
            Event::RoundStarted { .. } => Some(Cue::RoundStart),
            Event::PhaseEntered {
                phase, announce, ..
            } => match (phase, announce) {
                (_, false) => None,
                (Phase::Relaxing, true) => Some(Cue::EnterRelax),
                (Phase::Contracting, true) => Some(Cue::EnterContract),
            },
            Event::RoundCompleted { .. } => Some(Cue::RoundComplete),
            _ => None,
        }
    }
}
