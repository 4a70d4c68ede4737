use clap::Args;
use kegel_core::notify::TerminalVoice;
use kegel_core::{Config, Dispatcher, Event, PhaseDurations, PhaseEngine, ROUND_SECS};

use super::resolve_durations;
use crate::render::TerminalPresenter;

#[derive(Args)]
pub struct SimulateArgs {
    /// Contract phase length in seconds
    #[arg(long)]
    contract: Option<u32>,
    /// Relax phase length in seconds
    #[arg(long)]
    relax: Option<u32>,
    /// Stop after this many ticks (default: until the round completes)
    #[arg(long)]
    ticks: Option<u32>,
    /// Print events as JSON lines instead of the rendered display
    #[arg(long)]
    json: bool,
    /// Leave out spoken cues in rendered output
    #[arg(long)]
    no_voice: bool,
}

/// Start a round and tick it without a clock. A completed round is settled
/// straight away.
fn simulate(durations: PhaseDurations, max_ticks: u32) -> (PhaseEngine, Vec<Event>) {
    let mut engine = PhaseEngine::with_durations(durations);
    let mut events: Vec<Event> = engine.start(durations).into_iter().collect();

    let mut ticks = 0;
    while engine.is_running() && ticks < max_ticks {
        events.extend(engine.tick());
        ticks += 1;
    }
    events.extend(engine.settle());
    (engine, events)
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let durations = resolve_durations(&config, args.contract, args.relax);
    let max_ticks = args.ticks.unwrap_or(ROUND_SECS + 1);
    let (engine, events) = simulate(durations, max_ticks);

    if args.json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    let mut dispatcher = Dispatcher::new()
        .with_presenter(TerminalPresenter::new(std::io::stdout()))
        .with_voice(TerminalVoice::new(config.voice.locale, std::io::stdout()));
    dispatcher.set_voice_enabled(config.voice.enabled && !args.no_voice);
    for event in &events {
        dispatcher.dispatch(event, false);
    }
    println!(
        "completed cycles: {}, rounds: {}",
        engine.completed_cycles(),
        engine.total_rounds()
    );
    Ok(())
}
