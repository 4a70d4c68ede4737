use kegel_core::{Config, PhaseEngine};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let engine = PhaseEngine::with_durations(config.durations());
    let snapshot = engine.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
