use std::io::Write;

use kegel_core::{CollaboratorError, DisplayFrame, Event, Phase, Presenter};

const BAR_WIDTH: usize = 20;

/// Line-oriented countdown renderer.
pub struct TerminalPresenter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) -> Result<(), CollaboratorError> {
        writeln!(self.out, "{text}")
            .and_then(|()| self.out.flush())
            .map_err(|e| CollaboratorError::output("display", e))
    }
}

fn progress_bar(progress_pct: f64) -> String {
    let filled = ((progress_pct / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Contracting => "contract, hold",
        Phase::Relaxing => "relax",
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn on_display_update(&mut self, frame: &DisplayFrame) -> Result<(), CollaboratorError> {
        let text = format!(
            "{:>2}s [{}] {} {}s | total {} min",
            frame.remaining_secs,
            progress_bar(frame.progress_pct),
            phase_label(frame.phase),
            frame.phase_remaining_secs,
            frame.total_minutes,
        );
        self.line(&text)
    }

    fn on_round_complete(&mut self, total_rounds: u64) -> Result<(), CollaboratorError> {
        self.line(&format!("round complete! rounds so far: {total_rounds}"))
    }

    fn on_reset(&mut self) -> Result<(), CollaboratorError> {
        self.line(&format!("60s [{}] ready", progress_bar(0.0)))
    }

    fn on_event(&mut self, event: &Event) -> Result<(), CollaboratorError> {
        match event {
            Event::RoundStarted {
                durations,
                planned_cycles,
                ..
            } => self.line(&format!(
                "round started: contract {}s / relax {}s, about {} cycles",
                durations.contract_secs(),
                durations.relax_secs(),
                planned_cycles
            )),
            Event::Paused { remaining_secs, .. } => {
                self.line(&format!("paused at {remaining_secs}s"))
            }
            Event::Resumed { remaining_secs, .. } => {
                self.line(&format!("resumed at {remaining_secs}s"))
            }
            _ => Ok(()),
        }
    }
}
