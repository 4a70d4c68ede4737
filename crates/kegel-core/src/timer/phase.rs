use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Length of one round in seconds. Fixed, not configurable.
pub const ROUND_SECS: u32 = 60;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Contracting,
    Relaxing,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Contracting => "contract",
            Phase::Relaxing => "relax",
        }
    }
}

/// Contract/relax lengths for a round, in seconds.
///
/// Both values are strictly positive; construct through [`PhaseDurations::new`]
/// to keep that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDurations")]
pub struct PhaseDurations {
    contract_secs: u32,
    relax_secs: u32,
}

impl PhaseDurations {
    pub fn new(contract_secs: u32, relax_secs: u32) -> Result<Self, ValidationError> {
        if contract_secs == 0 {
            return Err(ValidationError::NonPositiveDuration {
                field: "contract_secs".into(),
            });
        }
        if relax_secs == 0 {
            return Err(ValidationError::NonPositiveDuration {
                field: "relax_secs".into(),
            });
        }
        Ok(Self {
            contract_secs,
            relax_secs,
        })
    }

    pub fn contract_secs(&self) -> u32 {
        self.contract_secs
    }

    pub fn relax_secs(&self) -> u32 {
        self.relax_secs
    }

    /// Configured length of the given phase.
    pub fn of(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Contracting => self.contract_secs,
            Phase::Relaxing => self.relax_secs,
        }
    }

    /// One contract + relax pair.
    ///
    /// Saturates so absurd configurations cannot overflow.
    pub fn cycle_len(&self) -> u32 {
        self.contract_secs.saturating_add(self.relax_secs)
    }

    /// Number of cycles that fit in a round, counting a trailing partial one.
    ///
    /// Display data only; round completion never looks at it.
    pub fn planned_cycles(&self) -> u32 {
        ROUND_SECS.div_ceil(self.cycle_len())
    }
}

#[derive(Deserialize)]
struct RawDurations {
    contract_secs: u32,
    relax_secs: u32,
}

impl TryFrom<RawDurations> for PhaseDurations {
    type Error = ValidationError;

    fn try_from(raw: RawDurations) -> Result<Self, Self::Error> {
        Self::new(raw.contract_secs, raw.relax_secs)
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            contract_secs: 3,
            relax_secs: 2,
        }
    }
}
