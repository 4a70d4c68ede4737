//! Collaborators that consume engine events.
//!
//! Three independent layers sit around the engine: a presenter that renders
//! the countdown, a voice layer that speaks phase cues, and an ambient sound
//! layer that plays while the round is ticking. None of them can influence
//! timer state; a collaborator that fails is logged and switched off.

pub mod ambient;
pub mod voice;

use std::time::Duration;

use crate::error::CollaboratorError;
use crate::events::{Cue, Event};
use crate::timer::Phase;

pub use ambient::{MelodySequencer, Note, NoteSink, SequencedAmbient, TraceSink, Waveform};
pub use voice::{Locale, PhraseBook, TerminalVoice};

/// What the presenter needs to redraw the countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFrame {
    pub remaining_secs: u32,
    pub phase: Phase,
    pub phase_remaining_secs: u32,
    pub total_minutes: u64,
    pub progress_pct: f64,
}

/// Renders engine output.
pub trait Presenter: Send {
    fn on_display_update(&mut self, frame: &DisplayFrame) -> Result<(), CollaboratorError>;

    fn on_round_complete(&mut self, _total_rounds: u64) -> Result<(), CollaboratorError> {
        Ok(()) // default no-op
    }

    /// Display goes back to a full idle round (explicit reset or end of grace).
    fn on_reset(&mut self) -> Result<(), CollaboratorError> {
        Ok(()) // default no-op
    }

    /// Every event, after the specific hooks above.
    fn on_event(&mut self, _event: &Event) -> Result<(), CollaboratorError> {
        Ok(()) // default no-op
    }
}

/// Speaks short phrases at phase-entry and round-completion instants.
pub trait VoiceNotifier: Send {
    fn notify(&mut self, cue: Cue) -> Result<(), CollaboratorError>;
}

/// Decorative background sound, running in lockstep with the tick loop.
pub trait AmbientSound: Send {
    fn start(&mut self) -> Result<(), CollaboratorError>;

    fn stop(&mut self);

    /// Volume as a percentage; values above 100 are clamped.
    fn set_volume(&mut self, percent: u8);

    fn is_playing(&self) -> bool;

    /// Wall-clock time passed while playing.
    fn advance(&mut self, _elapsed: Duration) -> Result<(), CollaboratorError> {
        Ok(()) // default no-op
    }
}

/// Fans engine events out to the configured collaborators.
#[derive(Default)]
pub struct Dispatcher {
    presenter: Option<Box<dyn Presenter>>,
    voice: Option<Box<dyn VoiceNotifier>>,
    voice_enabled: bool,
    ambient: Option<Box<dyn AmbientSound>>,
    ambient_enabled: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenter = Some(Box::new(presenter));
        self
    }

    pub fn with_voice(mut self, voice: impl VoiceNotifier + 'static) -> Self {
        self.voice = Some(Box::new(voice));
        self.voice_enabled = true;
        self
    }

    pub fn with_ambient(mut self, ambient: impl AmbientSound + 'static) -> Self {
        self.ambient = Some(Box::new(ambient));
        self.ambient_enabled = true;
        self
    }

    pub fn has_presenter(&self) -> bool {
        self.presenter.is_some()
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub fn has_ambient(&self) -> bool {
        self.ambient.is_some()
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled && self.voice.is_some()
    }

    /// Toggle spoken cues without dropping the voice backend.
    pub fn set_voice_enabled(&mut self, enabled: bool) {
        self.voice_enabled = enabled;
    }

    pub fn ambient_enabled(&self) -> bool {
        self.ambient_enabled && self.ambient.is_some()
    }

    /// Switch music on or off; takes effect at the next `sync_ambient`.
    pub fn set_ambient_enabled(&mut self, enabled: bool) {
        self.ambient_enabled = enabled;
    }

    pub fn set_volume(&mut self, percent: u8) {
        if let Some(ambient) = self.ambient.as_mut() {
            ambient.set_volume(percent);
        }
    }

    /// Deliver one event. `ticking` is the engine's `is_ticking()` after the
    /// event was produced; ambient sound follows it.
    pub fn dispatch(&mut self, event: &Event, ticking: bool) {
        self.present(event);
        if let Some(cue) = event.cue() {
            self.speak(cue);
        }
        self.sync_ambient(ticking);
    }

    /// Feed elapsed time to the ambient layer.
    pub fn advance_ambient(&mut self, elapsed: Duration) {
        let Some(ambient) = self.ambient.as_mut() else {
            return;
        };
        if !ambient.is_playing() {
            return;
        }
        if let Err(e) = ambient.advance(elapsed) {
            tracing::warn!(error = %e, "ambient sound failed, disabling");
            ambient.stop();
            self.ambient = None;
        }
    }

    /// Make ambient sound match the tick loop.
    pub fn sync_ambient(&mut self, ticking: bool) {
        let wanted = ticking && self.ambient_enabled;
        let Some(ambient) = self.ambient.as_mut() else {
            return;
        };
        match (wanted, ambient.is_playing()) {
            (true, false) => {
                if let Err(e) = ambient.start() {
                    tracing::warn!(error = %e, "ambient sound unavailable, disabling");
                    self.ambient = None;
                }
            }
            (false, true) => ambient.stop(),
            _ => {}
        }
    }

    fn present(&mut self, event: &Event) {
        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };
        let result = match event {
            Event::DisplayUpdate {
                remaining_secs,
                phase,
                phase_remaining_secs,
                total_minutes,
                progress_pct,
                ..
            } => presenter.on_display_update(&DisplayFrame {
                remaining_secs: *remaining_secs,
                phase: *phase,
                phase_remaining_secs: *phase_remaining_secs,
                total_minutes: *total_minutes,
                progress_pct: *progress_pct,
            }),
            Event::RoundCompleted { total_rounds, .. } => presenter.on_round_complete(*total_rounds),
            Event::Reset { .. } | Event::RoundSettled { .. } => presenter.on_reset(),
            _ => Ok(()),
        }
        .and_then(|()| presenter.on_event(event));

        if let Err(e) = result {
            tracing::warn!(error = %e, "presenter failed, disabling");
            self.presenter = None;
        }
    }

    fn speak(&mut self, cue: Cue) {
        if !self.voice_enabled {
            return;
        }
        let Some(voice) = self.voice.as_mut() else {
            return;
        };
        if let Err(e) = voice.notify(cue) {
            tracing::warn!(error = %e, ?cue, "voice unavailable, disabling");
            self.voice = None;
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("presenter", &self.presenter.is_some())
            .field("voice", &self.voice.is_some())
            .field("voice_enabled", &self.voice_enabled)
            .field("ambient", &self.ambient.is_some())
            .finish()
    }
}
