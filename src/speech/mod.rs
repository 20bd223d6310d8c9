//! Chunked narration through the platform speech service.

mod chunker;
#[cfg(feature = "piper")]
mod piper;
mod service;
mod session;
mod voices;

pub use chunker::split_text_into_chunks;
#[cfg(feature = "piper")]
pub use piper::PiperSpeech;
#[cfg(test)]
pub use service::Utterance;
pub use service::{SpeechErrorKind, SpeechService, Unavailable, UtteranceCallback};
pub use session::{SpeechEffect, SpeechOptions, SpeechParams, SpeechSession, SpeechState};
pub use voices::Voice;

use serde::Serialize;
use std::fmt;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short user-facing message for the hosting surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "done",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}
