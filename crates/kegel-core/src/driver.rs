//! Real-time driver for the phase engine.
//!
//! [`TickDriver`] is a single tokio task that owns the engine, the
//! collaborator [`Dispatcher`] and the tick loop. Commands arrive over a
//! channel and are applied one at a time between ticks, so engine state is
//! never touched concurrently.
//!
//! The tick loop is an `Option<Interval>`: installed when the engine starts
//! ticking, dropped as soon as it stops (pause, hide, reset, round end). It is
//! only ever installed when absent, so at most one loop exists.

use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

use crate::error::{CoreError, Result};
use crate::notify::Dispatcher;
use crate::timer::{PhaseDurations, PhaseEngine, TimerState};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// How long the completed round stays on screen before the display resets.
pub const GRACE_PERIOD: Duration = Duration::from_secs(3);

const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
pub enum Command {
    Start(PhaseDurations),
    Pause,
    Resume,
    TogglePause,
    Reset,
    /// Host surface hidden (terminal lost focus, window minimised).
    Hide,
    SetVolume(u8),
    SetMusicEnabled(bool),
    SetVoiceEnabled(bool),
    Snapshot(oneshot::Sender<PhaseEngine>),
    Shutdown,
}

/// Cloneable sender side of a running [`TickDriver`].
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<Command>,
}

impl DriverHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoreError::DriverStopped)
    }

    pub async fn start(&self, durations: PhaseDurations) -> Result<()> {
        self.send(Command::Start(durations)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(Command::Resume).await
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.send(Command::TogglePause).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    pub async fn hide(&self) -> Result<()> {
        self.send(Command::Hide).await
    }

    pub async fn set_volume(&self, percent: u8) -> Result<()> {
        self.send(Command::SetVolume(percent)).await
    }

    pub async fn set_music_enabled(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetMusicEnabled(enabled)).await
    }

    pub async fn set_voice_enabled(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetVoiceEnabled(enabled)).await
    }

    /// Copy of the engine as of the last processed command or tick.
    pub async fn snapshot(&self) -> Result<PhaseEngine> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await?;
        rx.await.map_err(|_| CoreError::DriverStopped)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

pub struct TickDriver {
    engine: PhaseEngine,
    dispatcher: Dispatcher,
    commands: mpsc::Receiver<Command>,
    tick_loop: Option<Interval>,
    grace: Option<Pin<Box<Sleep>>>,
}

impl TickDriver {
    pub fn new(engine: PhaseEngine, dispatcher: Dispatcher) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = Self {
            engine,
            dispatcher,
            commands: rx,
            tick_loop: None,
            grace: None,
        };
        (driver, DriverHandle { tx })
    }

    /// Spawn onto the current runtime. The join handle yields the final engine.
    pub fn spawn(
        engine: PhaseEngine,
        dispatcher: Dispatcher,
    ) -> (DriverHandle, JoinHandle<PhaseEngine>) {
        let (driver, handle) = Self::new(engine, dispatcher);
        (handle, tokio::spawn(driver.run()))
    }

    /// Process commands and ticks until `Shutdown` or every handle is dropped.
    pub async fn run(mut self) -> PhaseEngine {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                () = next_tick(&mut self.tick_loop) => self.on_tick(),
                () = grace_elapsed(&mut self.grace) => self.on_grace_elapsed(),
            }
        }
        self.tick_loop = None;
        self.dispatcher.sync_ambient(false);
        tracing::debug!("tick driver stopped");
        self.engine
    }

    fn apply(&mut self, command: Command) {
        let event = match command {
            Command::Start(durations) => self.engine.start(durations),
            Command::Pause => self.engine.pause(),
            Command::Resume => self.engine.resume(),
            Command::TogglePause => self.engine.toggle_pause(),
            Command::Reset => self.engine.reset(),
            Command::Hide => self.engine.hide(),
            Command::SetVolume(percent) => {
                self.dispatcher.set_volume(percent);
                None
            }
            Command::SetMusicEnabled(enabled) => {
                self.dispatcher.set_ambient_enabled(enabled);
                self.dispatcher.sync_ambient(self.engine.is_ticking());
                None
            }
            Command::SetVoiceEnabled(enabled) => {
                self.dispatcher.set_voice_enabled(enabled);
                None
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.engine.clone());
                None
            }
            Command::Shutdown => None,
        };
        if let Some(event) = event {
            self.dispatcher.dispatch(&event, self.engine.is_ticking());
        }
        self.sync_loops();
    }

    fn on_tick(&mut self) {
        self.dispatcher.advance_ambient(TICK_PERIOD);
        for event in self.engine.tick() {
            self.dispatcher.dispatch(&event, self.engine.is_ticking());
        }
        self.sync_loops();
    }

    fn on_grace_elapsed(&mut self) {
        self.grace = None;
        if let Some(event) = self.engine.settle() {
            self.dispatcher.dispatch(&event, self.engine.is_ticking());
        }
    }

    /// Bring the tick loop and grace timer in line with engine state.
    fn sync_loops(&mut self) {
        match (self.engine.is_ticking(), self.tick_loop.is_some()) {
            (true, false) => {
                let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
                interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
                self.tick_loop = Some(interval);
            }
            (false, true) => self.tick_loop = None,
            _ => {}
        }

        let completed = self.engine.state() == TimerState::Completed;
        match (completed, self.grace.is_some()) {
            (true, false) => self.grace = Some(Box::pin(time::sleep(GRACE_PERIOD))),
            (false, true) => self.grace = None,
            _ => {}
        }
    }
}

async fn next_tick(tick_loop: &mut Option<Interval>) {
    match tick_loop.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn grace_elapsed(grace: &mut Option<Pin<Box<Sleep>>>) {
    match grace.as_mut() {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::events::Cue;
    use crate::notify::{AmbientSound, Note, NoteSink, SequencedAmbient, VoiceNotifier};
    use crate::timer::Phase;
    use std::sync::{Arc, Mutex};

    fn durations(contract: u32, relax: u32) -> PhaseDurations {
        PhaseDurations::new(contract, relax).unwrap()
    }

    #[derive(Clone, Default)]
    struct Cues(Arc<Mutex<Vec<Cue>>>);

    impl VoiceNotifier for Cues {
        fn notify(&mut self, cue: Cue) -> std::result::Result<(), CollaboratorError> {
            self.0.lock().unwrap().push(cue);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Playing(Arc<Mutex<bool>>);

    impl AmbientSound for Playing {
        fn start(&mut self) -> std::result::Result<(), CollaboratorError> {
            *self.0.lock().unwrap() = true;
            Ok(())
        }
        fn stop(&mut self) {
            *self.0.lock().unwrap() = false;
        }
        fn set_volume(&mut self, _percent: u8) {}
        fn is_playing(&self) -> bool {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct Notes(Arc<Mutex<Vec<Note>>>);

    impl NoteSink for Notes {
        fn play(&mut self, note: &Note) -> std::result::Result<(), CollaboratorError> {
            self.0.lock().unwrap().push(note.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second() {
        let (handle, join) = TickDriver::spawn(PhaseEngine::new(), Dispatcher::new());
        handle.start(durations(3, 2)).await.unwrap();

        time::sleep(Duration::from_millis(3_500)).await;
        let engine = handle.snapshot().await.unwrap();
        assert_eq!(engine.remaining_secs(), 57);
        assert_eq!(engine.phase(), Phase::Relaxing);

        handle.shutdown().await.unwrap();
        let engine = join.await.unwrap();
        assert_eq!(engine.total_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_countdown() {
        let (handle, _join) = TickDriver::spawn(PhaseEngine::new(), Dispatcher::new());
        handle.start(durations(3, 2)).await.unwrap();
        time::sleep(Duration::from_millis(2_500)).await;
        handle.pause().await.unwrap();

        time::sleep(Duration::from_secs(30)).await;
        let engine = handle.snapshot().await.unwrap();
        assert_eq!(engine.state(), TimerState::Paused);
        assert_eq!(engine.remaining_secs(), 58);

        handle.resume().await.unwrap();
        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(handle.snapshot().await.unwrap().remaining_secs(), 57);
    }

    #[tokio::test(start_paused = true)]
    async fn hide_behaves_like_pause() {
        let (handle, _join) = TickDriver::spawn(PhaseEngine::new(), Dispatcher::new());
        handle.start(durations(3, 2)).await.unwrap();
        time::sleep(Duration::from_millis(1_500)).await;
        handle.hide().await.unwrap();
        time::sleep(Duration::from_secs(10)).await;
        let engine = handle.snapshot().await.unwrap();
        assert!(engine.is_paused());
        assert_eq!(engine.remaining_secs(), 59);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_and_resume_never_double_tick() {
        let (handle, _join) = TickDriver::spawn(PhaseEngine::new(), Dispatcher::new());
        handle.start(durations(3, 2)).await.unwrap();
        handle.start(durations(3, 2)).await.unwrap();
        handle.resume().await.unwrap();
        handle.toggle_pause().await.unwrap();
        handle.toggle_pause().await.unwrap();
        time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(handle.snapshot().await.unwrap().remaining_secs(), 55);
    }

    #[tokio::test(start_paused = true)]
    async fn round_completes_then_settles_after_grace() {
        let cues = Cues::default();
        let ambient = Playing::default();
        let dispatcher = Dispatcher::new()
            .with_voice(cues.clone())
            .with_ambient(ambient.clone());
        let (handle, _join) = TickDriver::spawn(PhaseEngine::new(), dispatcher);
        handle.start(durations(7, 5)).await.unwrap();
        handle.snapshot().await.unwrap();
        assert!(ambient.is_playing());

        // 60 counted seconds plus the completing tick.
        time::sleep(Duration::from_millis(61_500)).await;
        let engine = handle.snapshot().await.unwrap();
        assert_eq!(engine.state(), TimerState::Completed);
        assert_eq!(engine.total_rounds(), 1);
        assert!(!ambient.is_playing());
        assert_eq!(cues.0.lock().unwrap().last(), Some(&Cue::RoundComplete));

        time::sleep(Duration::from_secs(3)).await;
        let engine = handle.snapshot().await.unwrap();
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 60);
        assert_eq!(engine.total_rounds(), 1);

        // idle: no further ticks
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.snapshot().await.unwrap().total_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn volume_change_applies_to_next_notes() {
        let notes = Notes::default();
        let dispatcher = Dispatcher::new().with_ambient(SequencedAmbient::new(50, notes.clone()));
        let (handle, _join) = TickDriver::spawn(PhaseEngine::new(), dispatcher);
        handle.start(durations(3, 2)).await.unwrap();

        time::sleep(Duration::from_millis(1_500)).await;
        handle.snapshot().await.unwrap();
        let before = notes.0.lock().unwrap().last().cloned().unwrap();
        assert_eq!(before.at_ms, 1_000);
        assert!((before.gain - 0.04).abs() < 1e-6);

        handle.set_volume(100).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;
        handle.snapshot().await.unwrap();
        let after = notes.0.lock().unwrap().last().cloned().unwrap();
        assert_eq!(after.at_ms, 2_000);
        assert!((after.gain - 0.08).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn music_toggle_mid_round() {
        let ambient = Playing::default();
        let dispatcher = Dispatcher::new().with_ambient(ambient.clone());
        let (handle, _join) = TickDriver::spawn(PhaseEngine::new(), dispatcher);
        handle.start(durations(3, 2)).await.unwrap();
        handle.snapshot().await.unwrap();
        assert!(ambient.is_playing());

        handle.set_music_enabled(false).await.unwrap();
        handle.snapshot().await.unwrap();
        assert!(!ambient.is_playing());

        // pause and resume must not bring the music back
        handle.pause().await.unwrap();
        handle.resume().await.unwrap();
        handle.snapshot().await.unwrap();
        assert!(!ambient.is_playing());

        handle.set_music_enabled(true).await.unwrap();
        let engine = handle.snapshot().await.unwrap();
        assert!(ambient.is_playing());
        assert!(engine.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_tick_loop() {
        let (handle, _join) = TickDriver::spawn(PhaseEngine::new(), Dispatcher::new());
        handle.start(durations(2, 1)).await.unwrap();
        time::sleep(Duration::from_millis(4_500)).await;
        handle.reset().await.unwrap();
        time::sleep(Duration::from_secs(10)).await;

        let engine = handle.snapshot().await.unwrap();
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 60);
        assert_eq!(engine.completed_cycles(), 0);
        assert_eq!(engine.total_secs(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_all_handles_stops_driver() {
        let (handle, join) = TickDriver::spawn(PhaseEngine::new(), Dispatcher::new());
        handle.start(durations(3, 2)).await.unwrap();
        drop(handle);
        let engine = join.await.unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.remaining_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_reports_stopped_driver() {
        let (handle, join) = TickDriver::spawn(PhaseEngine::new(), Dispatcher::new());
        handle.shutdown().await.unwrap();
        join.await.unwrap();
        assert!(matches!(
            handle.pause().await,
            Err(CoreError::DriverStopped)
        ));
    }
}
