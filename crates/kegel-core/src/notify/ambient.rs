//! Generated ambient background melody.
//!
//! A C–Am–F–G chord pad (triangle waves, chord change every 4 s) under a
//! 16-note sine melody (one note every 500 ms). The sequencer only produces
//! [`Note`]s on a millisecond clock; rendering them is up to a [`NoteSink`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AmbientSound;
use crate::error::CollaboratorError;

const CHORD_PERIOD_MS: u64 = 4_000;
const MELODY_PERIOD_MS: u64 = 500;
const MELODY_NOTE_MS: u64 = 450;
const CHORD_GAIN: f32 = 0.03;
const MELODY_GAIN: f32 = 0.08;

const CHORDS: [[f32; 3]; 4] = [
    [261.63, 329.63, 392.00], // C
    [220.00, 261.63, 329.63], // Am
    [174.61, 220.00, 261.63], // F
    [196.00, 246.94, 293.66], // G
];

const MELODY: [f32; 16] = [
    523.25, 587.33, 659.25, 587.33,
    523.25, 440.00, 523.25, 587.33,
    659.25, 587.33, 523.25, 440.00,
    392.00, 440.00, 523.25, 392.00,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Offset from sequencer start.
    pub at_ms: u64,
    pub frequencies: Vec<f32>,
    pub waveform: Waveform,
    pub gain: f32,
    /// `None` holds until the next chord replaces it.
    pub duration_ms: Option<u64>,
}

/// Deterministic note schedule for the background melody.
#[derive(Debug, Clone)]
pub struct MelodySequencer {
    clock_ms: u64,
    next_chord_ms: u64,
    next_melody_ms: u64,
    chord_index: usize,
    melody_index: usize,
    volume: f32,
}

impl MelodySequencer {
    pub fn new(volume_percent: u8) -> Self {
        Self {
            clock_ms: 0,
            next_chord_ms: 0,
            next_melody_ms: MELODY_PERIOD_MS,
            chord_index: 0,
            melody_index: 0,
            volume: percent_to_level(volume_percent),
        }
    }

    /// Rewind to the first chord and note.
    pub fn restart(&mut self) {
        let volume = self.volume;
        *self = Self {
            volume,
            ..Self::new(0)
        };
    }

    pub fn set_volume(&mut self, percent: u8) {
        self.volume = percent_to_level(percent);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn chord_gain(&self) -> f32 {
        self.volume * CHORD_GAIN
    }

    pub fn melody_gain(&self) -> f32 {
        self.volume * MELODY_GAIN
    }

    /// Move the clock forward and return every note due in `(previous, now]`,
    /// plus the opening chord at time zero.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Note> {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.clock_ms = self.clock_ms.saturating_add(elapsed_ms);

        let mut notes = Vec::new();
        loop {
            let chord_due = self.next_chord_ms <= self.clock_ms;
            let melody_due = self.next_melody_ms <= self.clock_ms;
            match (chord_due, melody_due) {
                (false, false) => break,
                (true, true) if self.next_chord_ms <= self.next_melody_ms => {
                    notes.push(self.next_chord())
                }
                (true, false) => notes.push(self.next_chord()),
                _ => notes.push(self.next_melody()),
            }
        }
        notes
    }

    fn next_chord(&mut self) -> Note {
        let chord = CHORDS[self.chord_index % CHORDS.len()];
        let note = Note {
            at_ms: self.next_chord_ms,
            frequencies: chord.to_vec(),
            waveform: Waveform::Triangle,
            gain: self.chord_gain(),
            duration_ms: None,
        };
        self.chord_index += 1;
        self.next_chord_ms += CHORD_PERIOD_MS;
        note
    }

    fn next_melody(&mut self) -> Note {
        let note = Note {
            at_ms: self.next_melody_ms,
            frequencies: vec![MELODY[self.melody_index % MELODY.len()]],
            waveform: Waveform::Sine,
            gain: self.melody_gain(),
            duration_ms: Some(MELODY_NOTE_MS),
        };
        self.melody_index += 1;
        self.next_melody_ms += MELODY_PERIOD_MS;
        note
    }
}

fn percent_to_level(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// Something that can render notes.
pub trait NoteSink: Send {
    fn play(&mut self, note: &Note) -> Result<(), CollaboratorError>;

    fn silence(&mut self) {}
}

/// Emits notes as trace events. Used where no audio device is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceSink;

impl NoteSink for TraceSink {
    fn play(&mut self, note: &Note) -> Result<(), CollaboratorError> {
        tracing::trace!(
            at_ms = note.at_ms,
            waveform = ?note.waveform,
            gain = note.gain,
            frequencies = ?note.frequencies,
            "ambient note"
        );
        Ok(())
    }
}

/// [`AmbientSound`] backed by a [`MelodySequencer`].
pub struct SequencedAmbient<S: NoteSink> {
    sequencer: MelodySequencer,
    sink: S,
    playing: bool,
}

impl<S: NoteSink> SequencedAmbient<S> {
    pub fn new(volume_percent: u8, sink: S) -> Self {
        Self {
            sequencer: MelodySequencer::new(volume_percent),
            sink,
            playing: false,
        }
    }

    pub fn sequencer(&self) -> &MelodySequencer {
        &self.sequencer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn play_due(&mut self, elapsed: Duration) -> Result<(), CollaboratorError> {
        for note in self.sequencer.advance(elapsed) {
            self.sink.play(&note)?;
        }
        Ok(())
    }
}

impl<S: NoteSink> AmbientSound for SequencedAmbient<S> {
    fn start(&mut self) -> Result<(), CollaboratorError> {
        if self.playing {
            return Ok(());
        }
        self.sequencer.restart();
        self.playing = true;
        tracing::debug!(volume = self.sequencer.volume(), "ambient sound started");
        self.play_due(Duration::ZERO)
    }

    fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            self.sink.silence();
            tracing::debug!("ambient sound stopped");
        }
    }

    fn set_volume(&mut self, percent: u8) {
        self.sequencer.set_volume(percent);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn advance(&mut self, elapsed: Duration) -> Result<(), CollaboratorError> {
        if !self.playing {
            return Ok(());
        }
        self.play_due(elapsed)
    }
}
