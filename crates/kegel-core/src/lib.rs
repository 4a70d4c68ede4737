//! # Kegel Core Library
//!
//! Core logic for an interval exercise timer that alternates "contract" and
//! "relax" phases over a fixed 60-second round. The CLI binary is a thin
//! layer over this crate.
//!
//! ## Architecture
//!
//! - **Phase Engine**: second-granularity state machine; the caller invokes
//!   `tick()` once per elapsed second
//! - **Tick Driver**: tokio task that owns the engine and the single tick loop,
//!   applying commands between ticks
//! - **Collaborators**: presentation, voice cue and ambient sound layers fed
//!   from engine events, each able to fail without affecting the timer
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`PhaseEngine`]: Core timer state machine
//! - [`TickDriver`]: Real-time driver for the engine
//! - [`Dispatcher`]: Fans events out to collaborators
//! - [`Config`]: Application configuration management

pub mod driver;
pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod timer;

pub use driver::{Command, DriverHandle, TickDriver};
pub use error::{CollaboratorError, ConfigError, CoreError, ValidationError};
pub use events::{Cue, Event};
pub use notify::{AmbientSound, Dispatcher, DisplayFrame, Presenter, VoiceNotifier};
pub use storage::Config;
pub use timer::{Phase, PhaseDurations, PhaseEngine, TimerState, ROUND_SECS};
