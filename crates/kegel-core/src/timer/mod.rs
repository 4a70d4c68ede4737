mod engine;
mod phase;

pub use engine::{PhaseEngine, TimerState};
pub use phase::{Phase, PhaseDurations, ROUND_SECS};
