//! Capability boundary to the platform text-to-speech engine.

use super::Voice;
use crate::session::SessionEvent;
use anyhow::Result;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Why an utterance ended early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorKind {
    Interrupted,
    Canceled,
    Failed(String),
}

impl SpeechErrorKind {
    /// Interruptions and cancellations follow our own stop/cancel calls.
    pub fn is_expected(&self) -> bool {
        matches!(self, SpeechErrorKind::Interrupted | SpeechErrorKind::Canceled)
    }
}

impl fmt::Display for SpeechErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechErrorKind::Interrupted => f.write_str("interrupted"),
            SpeechErrorKind::Canceled => f.write_str("canceled"),
            SpeechErrorKind::Failed(reason) => f.write_str(reason),
        }
    }
}

/// One chunk handed to the speech service.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub generation: u64,
    pub chunk_index: usize,
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Completion handle for a single utterance. Consumed by whichever of
/// `complete` or `fail` fires first.
#[derive(Debug, Clone)]
pub struct UtteranceCallback {
    events: UnboundedSender<SessionEvent>,
    generation: u64,
    chunk_index: usize,
}

impl UtteranceCallback {
    pub fn new(events: UnboundedSender<SessionEvent>, utterance: &Utterance) -> Self {
        Self {
            events,
            generation: utterance.generation,
            chunk_index: utterance.chunk_index,
        }
    }

    pub fn complete(self) {
        self.send(SessionEvent::ChunkFinished {
            generation: self.generation,
            chunk: self.chunk_index,
        });
    }

    pub fn fail(self, kind: SpeechErrorKind) {
        self.send(SessionEvent::ChunkFailed {
            generation: self.generation,
            chunk: self.chunk_index,
            kind,
        });
    }

    fn send(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!(
                generation = self.generation,
                chunk = self.chunk_index,
                "Session closed before speech callback"
            );
        }
    }
}

/// The platform speech engine: a single global resource.
pub trait SpeechService {
    fn is_supported(&self) -> bool;

    /// Whether the engine silently stalls on long narration and needs a
    /// periodic pause/resume nudge.
    fn needs_keepalive(&self) -> bool {
        false
    }

    fn list_voices(&self) -> Vec<Voice>;

    /// Start narrating. Exactly one of the callback's methods must fire
    /// once the utterance ends, unless `speak` itself errors.
    fn speak(&mut self, utterance: Utterance, callback: UtteranceCallback) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Abort the in-flight utterance, whose callback then fails with
    /// [`SpeechErrorKind::Canceled`] or [`SpeechErrorKind::Interrupted`].
    fn cancel(&mut self) -> Result<()>;
}

impl SpeechService for Box<dyn SpeechService> {
    fn is_supported(&self) -> bool {
        (**self).is_supported()
    }

    fn needs_keepalive(&self) -> bool {
        (**self).needs_keepalive()
    }

    fn list_voices(&self) -> Vec<Voice> {
        (**self).list_voices()
    }

    fn speak(&mut self, utterance: Utterance, callback: UtteranceCallback) -> Result<()> {
        (**self).speak(utterance, callback)
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<()> {
        (**self).resume()
    }

    fn cancel(&mut self) -> Result<()> {
        (**self).cancel()
    }
}

/// Stand-in for platforms without speech synthesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl SpeechService for Unavailable {
    fn is_supported(&self) -> bool {
        false
    }

    fn list_voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&mut self, utterance: Utterance, _callback: UtteranceCallback) -> Result<()> {
        anyhow::bail!(
            "speech synthesis unavailable (chunk {})",
            utterance.chunk_index
        )
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}
