//! Spoken cues.
//!
//! The voice layer owns locale selection: the engine only hands it a [`Cue`],
//! and the [`PhraseBook`] turns that into text for the configured locale.

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::VoiceNotifier;
use crate::error::CollaboratorError;
use crate::events::Cue;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "en")]
    En,
}

impl Locale {
    pub fn tag(self) -> &'static str {
        match self {
            Locale::ZhCn => "zh-CN",
            Locale::En => "en",
        }
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zh-cn" | "zh" => Ok(Locale::ZhCn),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

/// Cue phrases for one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseBook {
    locale: Locale,
}

impl PhraseBook {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn phrase(&self, cue: Cue) -> &'static str {
        match (self.locale, cue) {
            (Locale::ZhCn, Cue::RoundStart) => "开始训练，准备提肛",
            (Locale::ZhCn, Cue::EnterRelax) => "放松",
            (Locale::ZhCn, Cue::EnterContract) => "提肛",
            (Locale::ZhCn, Cue::RoundComplete) => "一轮训练完成，休息一下吧",
            (Locale::En, Cue::RoundStart) => "Round started, get ready to contract",
            (Locale::En, Cue::EnterRelax) => "Relax",
            (Locale::En, Cue::EnterContract) => "Contract",
            (Locale::En, Cue::RoundComplete) => "Round complete, take a break",
        }
    }
}

/// Writes cue phrases to a text sink (terminal, log file) instead of a
/// speech engine.
pub struct TerminalVoice<W: Write + Send> {
    book: PhraseBook,
    out: W,
}

impl<W: Write + Send> TerminalVoice<W> {
    pub fn new(locale: Locale, out: W) -> Self {
        Self {
            book: PhraseBook::new(locale),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> VoiceNotifier for TerminalVoice<W> {
    fn notify(&mut self, cue: Cue) -> Result<(), CollaboratorError> {
        let phrase = self.book.phrase(cue);
        tracing::debug!(?cue, locale = self.book.locale().tag(), phrase, "voice cue");
        writeln!(self.out, "» {phrase}")
            .and_then(|()| self.out.flush())
            .map_err(|e| CollaboratorError::output("voice", e))
    }
}
