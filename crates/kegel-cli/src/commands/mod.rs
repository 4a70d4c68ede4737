pub mod config;
pub mod run;
pub mod simulate;
pub mod status;

use kegel_core::{Config, PhaseDurations};

/// Durations from command-line overrides, falling back to the configured
/// values when an override is missing or not positive.
pub fn resolve_durations(
    config: &Config,
    contract: Option<u32>,
    relax: Option<u32>,
) -> PhaseDurations {
    let configured = config.durations();
    let contract = contract.unwrap_or(configured.contract_secs());
    let relax = relax.unwrap_or(configured.relax_secs());
    PhaseDurations::new(contract, relax).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring invalid duration override");
        configured
    })
}
