//! One reading session: settings, progress and narration for a single
//! document, driven by [`SessionEvent`]s and answering with [`Effect`]s.

mod shortcuts;
mod view;

pub use shortcuts::COMMAND_HELP;
pub use view::{ProgressView, ReaderSnapshot, SpeechView};

use crate::config::AppConfig;
use crate::progress::{AutoScrollDriver, DriverMode, ScrollEffect, ScrollGeometry, ScrollPacing};
use crate::settings::{AmbientMode, ReaderSettings, SettingUpdate, SettingsReconciler};
use crate::speech::{SpeechEffect, SpeechErrorKind, SpeechOptions, SpeechParams, SpeechSession, Voice};
use crate::store::KeyValueStore;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Layout changed without the reader scrolling.
    Resized(ScrollGeometry),
    Scrolled(ScrollGeometry),
    ScrollTick { generation: u64 },
    StartAutoScroll,
    StopAutoScroll,
    ToggleAutoScroll,
    UpdateSetting(SettingUpdate),
    ToggleEyeProtection,
    ResetSettings,
    AmbientModeChanged(AmbientMode),
    Speak { start_chunk: usize },
    PauseSpeech,
    ResumeSpeech,
    StopSpeech,
    ToggleSpeech,
    ChunkFinished { generation: u64, chunk: usize },
    ChunkFailed { generation: u64, chunk: usize, kind: SpeechErrorKind },
    KeepAliveTick { generation: u64 },
    VoicesLoaded(Vec<Voice>),
    /// A typed host command (a key such as `a`, or `key=value`).
    Command(String),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Scroll(ScrollEffect),
    Speech(SpeechEffect),
    /// Display settings changed; the viewport should re-layout.
    ApplySettings(ReaderSettings),
    Exit,
}

pub struct ReadingSession<S> {
    reconciler: SettingsReconciler<S>,
    driver: AutoScrollDriver,
    speech: SpeechSession,
    ambient: AmbientMode,
    text: String,
}

impl<S: KeyValueStore> ReadingSession<S> {
    pub fn new(
        config: &AppConfig,
        reconciler: SettingsReconciler<S>,
        speech_options: SpeechOptions,
        speech_supported: bool,
        text: String,
    ) -> Self {
        let settings = reconciler.settings();
        let driver = AutoScrollDriver::new(ScrollPacing::from(config), settings.auto_scroll_speed);
        let speech = SpeechSession::new(speech_options, speech_supported, SpeechParams::from(settings));
        Self {
            reconciler,
            driver,
            speech,
            ambient: config.ambient_mode.resolve(None),
            text,
        }
    }

    /// Ambient mode observed by the host at startup.
    pub fn with_ambient_mode(mut self, mode: AmbientMode) -> Self {
        self.ambient = mode;
        self
    }

    /// Effects to run once before the first event.
    pub fn open(&mut self) -> Vec<Effect> {
        self.reconciler.ambient_mode_changed(self.ambient);
        let settings = self.reconciler.settings().clone();
        info!(
            chars = self.text.chars().count(),
            auto_scroll = settings.auto_scroll_enabled,
            dark = settings.dark_mode_enabled,
            "Opening reading session"
        );
        let mut effects = vec![Effect::ApplySettings(settings.clone())];
        if settings.auto_scroll_enabled {
            push_scroll(&mut effects, self.driver.start());
        }
        effects
    }

    pub fn settings(&self) -> &ReaderSettings {
        self.reconciler.settings()
    }

    /// Neither auto-scrolling nor narrating.
    pub fn is_idle(&self) -> bool {
        !self.driver.is_auto_scrolling() && !self.speech.is_active()
    }

    pub fn snapshot(&self, now: Instant) -> ReaderSnapshot {
        ReaderSnapshot {
            settings: self.reconciler.settings().clone(),
            progress: ProgressView {
                percentage: self.driver.percentage(),
                auto_scrolling: self.driver.is_auto_scrolling(),
                paused_by_user: self.driver.mode() == DriverMode::PausedByUser,
                last_scroll_was_user: self.driver.recently_scrolled_by_user(now),
            },
            speech: SpeechView {
                state: self.speech.state(),
                current_chunk_index: self.speech.current_chunk_index(),
                total_chunks: self.speech.total_chunks(),
            },
        }
    }

    /// When `last_scroll_was_user` will next flip back to false.
    pub fn user_scroll_expiry(&self, now: Instant) -> Option<Instant> {
        self.driver.user_scroll_window_end(now)
    }

    pub fn reduce(&mut self, event: SessionEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            SessionEvent::Resized(geometry) => {
                push_scroll(&mut effects, self.driver.on_resize(geometry));
            }
            SessionEvent::Scrolled(geometry) => {
                push_scroll(&mut effects, self.driver.on_scroll(geometry, now));
            }
            SessionEvent::ScrollTick { generation } => {
                push_scroll(&mut effects, self.driver.on_tick(generation));
            }
            SessionEvent::StartAutoScroll => self.handle_start_auto_scroll(&mut effects),
            SessionEvent::StopAutoScroll => self.handle_stop_auto_scroll(&mut effects),
            SessionEvent::ToggleAutoScroll => self.handle_toggle_auto_scroll(&mut effects),
            SessionEvent::UpdateSetting(update) => {
                let before = self.reconciler.settings().clone();
                self.reconciler.update(update);
                self.propagate_settings(&before, &mut effects);
            }
            SessionEvent::ToggleEyeProtection => {
                let before = self.reconciler.settings().clone();
                self.reconciler.toggle_eye_protection();
                self.propagate_settings(&before, &mut effects);
            }
            SessionEvent::ResetSettings => {
                let before = self.reconciler.settings().clone();
                self.reconciler.reset();
                self.propagate_settings(&before, &mut effects);
            }
            SessionEvent::AmbientModeChanged(mode) => {
                let before = self.reconciler.settings().clone();
                self.reconciler.ambient_mode_changed(mode);
                self.propagate_settings(&before, &mut effects);
            }
            SessionEvent::Speak { start_chunk } => {
                push_speech(&mut effects, self.speech.speak(&self.text, start_chunk));
            }
            SessionEvent::PauseSpeech => push_speech(&mut effects, self.speech.pause()),
            SessionEvent::ResumeSpeech => push_speech(&mut effects, self.speech.resume()),
            SessionEvent::StopSpeech => push_speech(&mut effects, self.speech.stop()),
            SessionEvent::ToggleSpeech => {
                push_speech(&mut effects, self.speech.toggle(&self.text));
            }
            SessionEvent::ChunkFinished { generation, chunk } => {
                push_speech(&mut effects, self.speech.on_chunk_finished(generation, chunk));
            }
            SessionEvent::ChunkFailed {
                generation,
                chunk,
                kind,
            } => {
                push_speech(
                    &mut effects,
                    self.speech.on_chunk_failed(generation, chunk, &kind),
                );
            }
            SessionEvent::KeepAliveTick { generation } => {
                push_speech(&mut effects, self.speech.on_keepalive_tick(generation));
            }
            SessionEvent::VoicesLoaded(voices) => self.speech.set_voices(voices),
            SessionEvent::Command(command) => match self.event_for_command(&command) {
                Ok(event) => {
                    debug!(command = %command, ?event, "Host command");
                    effects.extend(self.reduce(event, now));
                }
                Err(err) => warn!(command = %command, "Ignoring host command: {err}"),
            },
            SessionEvent::Shutdown => {
                info!("Closing reading session");
                push_scroll(&mut effects, self.driver.stop());
                push_speech(&mut effects, self.speech.stop());
                effects.push(Effect::Exit);
            }
        }

        effects
    }

    fn handle_start_auto_scroll(&mut self, effects: &mut Vec<Effect>) {
        if self.reconciler.settings().auto_scroll_enabled {
            push_scroll(effects, self.driver.start());
        } else {
            let before = self.reconciler.settings().clone();
            self.reconciler.update(SettingUpdate::AutoScroll(true));
            self.propagate_settings(&before, effects);
        }
    }

    fn handle_stop_auto_scroll(&mut self, effects: &mut Vec<Effect>) {
        if self.reconciler.settings().auto_scroll_enabled {
            let before = self.reconciler.settings().clone();
            self.reconciler.update(SettingUpdate::AutoScroll(false));
            self.propagate_settings(&before, effects);
        } else {
            push_scroll(effects, self.driver.stop());
        }
    }

    /// Direct-interaction toggle. The stored preference follows the driver,
    /// except that resuming after a manual scroll keeps it as is.
    fn handle_toggle_auto_scroll(&mut self, effects: &mut Vec<Effect>) {
        let want_running = !self.driver.is_auto_scrolling();
        if self.reconciler.settings().auto_scroll_enabled != want_running {
            let before = self.reconciler.settings().clone();
            self.reconciler.toggle_auto_scroll();
            self.propagate_settings(&before, effects);
        } else {
            push_scroll(effects, self.driver.toggle());
        }
    }

    /// Push a settings change out to the driver, narration and viewport.
    fn propagate_settings(&mut self, before: &ReaderSettings, effects: &mut Vec<Effect>) {
        let after = self.reconciler.settings().clone();
        if &after == before {
            debug!("Settings unchanged");
            return;
        }

        if after.auto_scroll_speed != before.auto_scroll_speed {
            push_scroll(effects, self.driver.set_speed(after.auto_scroll_speed));
        }
        if after.auto_scroll_enabled != before.auto_scroll_enabled {
            if after.auto_scroll_enabled {
                if !self.driver.is_auto_scrolling() {
                    push_scroll(effects, self.driver.start());
                }
            } else {
                push_scroll(effects, self.driver.stop());
            }
        }
        self.speech.set_params(SpeechParams::from(&after));
        effects.push(Effect::ApplySettings(after));
    }
}

fn push_scroll(effects: &mut Vec<Effect>, scroll: Vec<ScrollEffect>) {
    effects.extend(scroll.into_iter().map(Effect::Scroll));
}

fn push_speech(effects: &mut Vec<Effect>, speech: Vec<SpeechEffect>) {
    effects.extend(speech.into_iter().map(Effect::Speech));
}
