use super::service::{SpeechErrorKind, Utterance};
use super::voices::{Voice, select_voice};
use super::{Notice, NoticeLevel, split_text_into_chunks};
use crate::config::AppConfig;
use crate::settings::ReaderSettings;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SpeechState {
    #[default]
    Idle,
    Speaking,
    Paused,
}

/// Requests for the runtime; the session itself never touches the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEffect {
    Cancel,
    Speak(Utterance),
    Pause,
    Resume,
    /// Pause immediately followed by resume.
    KeepAlive,
    ScheduleKeepAlive { generation: u64, interval: Duration },
    CancelKeepAlive,
    Notify(Notice),
}

/// Fixed knobs resolved once per session.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    pub max_chunk_len: usize,
    pub narration_languages: Vec<String>,
    /// `None` disables the stall keep-alive.
    pub keepalive_interval: Option<Duration>,
}

impl SpeechOptions {
    pub fn from_config(config: &AppConfig, service_needs_keepalive: bool) -> Self {
        let keepalive_interval = config
            .stall_keepalive
            .enabled_for(service_needs_keepalive)
            .then(|| config.keepalive_interval());
        Self {
            max_chunk_len: config.max_chunk_len.max(1),
            narration_languages: config.narration_languages.clone(),
            keepalive_interval,
        }
    }
}

/// Per-utterance voice parameters, taken from the reader settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParams {
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl From<&ReaderSettings> for SpeechParams {
    fn from(settings: &ReaderSettings) -> Self {
        Self {
            voice: settings.speech_voice.clone(),
            rate: settings.speech_rate,
            pitch: settings.speech_pitch,
            volume: settings.speech_volume,
        }
    }
}

/// Narration state machine.
///
/// Chunk `i + 1` is only requested from the completion of chunk `i`, and
/// every `speak`/`stop`/failure bumps `generation` so callbacks from a
/// cancelled run are recognised and dropped.
#[derive(Debug, Clone)]
pub struct SpeechSession {
    options: SpeechOptions,
    supported: bool,
    warned_unsupported: bool,
    params: SpeechParams,
    voices: Vec<Voice>,
    state: SpeechState,
    generation: u64,
    chunks: Vec<String>,
    current: usize,
}

impl SpeechSession {
    pub fn new(options: SpeechOptions, supported: bool, params: SpeechParams) -> Self {
        Self {
            options,
            supported,
            warned_unsupported: false,
            params,
            voices: Vec::new(),
            state: SpeechState::Idle,
            generation: 0,
            chunks: Vec::new(),
            current: 0,
        }
    }

    pub fn state(&self) -> SpeechState {
        self.state
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_chunk_index(&self) -> usize {
        self.current
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_active(&self) -> bool {
        self.state != SpeechState::Idle
    }

    pub fn selected_voice(&self) -> Option<&Voice> {
        select_voice(
            &self.voices,
            self.params.voice.as_deref(),
            &self.options.narration_languages,
        )
    }

    pub fn set_voices(&mut self, voices: Vec<Voice>) {
        self.voices = voices;
        info!(
            count = self.voices.len(),
            selected = self.selected_voice().map(|v| v.name.as_str()).unwrap_or("none"),
            "Speech voices loaded"
        );
    }

    /// New voice parameters apply from the next chunk on.
    pub fn set_params(&mut self, params: SpeechParams) {
        if params != self.params {
            debug!(rate = params.rate, pitch = params.pitch, volume = params.volume, "Speech params updated");
            self.params = params;
        }
    }

    pub fn speak(&mut self, text: &str, start_chunk: usize) -> Vec<SpeechEffect> {
        if !self.supported {
            if self.warned_unsupported {
                debug!("Speech requested but synthesis is unsupported");
                return Vec::new();
            }
            warn!("Speech requested but synthesis is unsupported");
            self.warned_unsupported = true;
            return vec![notify(
                NoticeLevel::Warning,
                "Speech synthesis is not supported on this platform",
            )];
        }
        if text.trim().is_empty() {
            warn!("Speech requested with no text");
            return vec![notify(NoticeLevel::Warning, "There is no text to read")];
        }

        let mut effects = vec![SpeechEffect::Cancel, SpeechEffect::CancelKeepAlive];
        self.generation += 1;
        self.chunks = split_text_into_chunks(text, self.options.max_chunk_len);
        if self.chunks.is_empty() {
            self.state = SpeechState::Idle;
            self.current = 0;
            effects.push(notify(NoticeLevel::Warning, "There is no readable content"));
            return effects;
        }

        self.current = if start_chunk < self.chunks.len() { start_chunk } else { 0 };
        self.state = SpeechState::Speaking;
        info!(
            generation = self.generation,
            start = self.current,
            total = self.chunks.len(),
            "Narration started"
        );
        effects.push(SpeechEffect::Speak(self.utterance()));
        effects.extend(self.schedule_keepalive());
        effects
    }

    pub fn on_chunk_finished(&mut self, generation: u64, chunk: usize) -> Vec<SpeechEffect> {
        if !self.is_current(generation, chunk) {
            debug!(generation, chunk, current = self.generation, "Ignoring stale chunk completion");
            return Vec::new();
        }

        if self.current + 1 < self.chunks.len() {
            self.current += 1;
            debug!(chunk = self.current, total = self.chunks.len(), "Advancing narration");
            let mut effects = vec![SpeechEffect::Speak(self.utterance())];
            if self.state == SpeechState::Paused {
                effects.push(SpeechEffect::Pause);
            }
            return effects;
        }

        info!(generation, total = self.chunks.len(), "Narration finished");
        self.finish();
        vec![
            SpeechEffect::CancelKeepAlive,
            notify(NoticeLevel::Success, "Finished reading"),
        ]
    }

    pub fn on_chunk_failed(
        &mut self,
        generation: u64,
        chunk: usize,
        kind: &SpeechErrorKind,
    ) -> Vec<SpeechEffect> {
        if !self.is_current(generation, chunk) {
            debug!(generation, chunk, %kind, "Ignoring stale chunk error");
            return Vec::new();
        }
        if kind.is_expected() {
            debug!(generation, chunk, %kind, "Utterance ended by cancellation");
            return Vec::new();
        }

        warn!(generation, chunk, %kind, "Speech synthesis failed");
        self.generation += 1;
        self.state = SpeechState::Idle;
        vec![
            SpeechEffect::CancelKeepAlive,
            notify(NoticeLevel::Error, format!("Speech synthesis failed: {kind}")),
        ]
    }

    pub fn pause(&mut self) -> Vec<SpeechEffect> {
        if self.state != SpeechState::Speaking {
            debug!(state = ?self.state, "Pause ignored");
            return Vec::new();
        }
        self.state = SpeechState::Paused;
        info!(chunk = self.current, "Narration paused");
        vec![
            SpeechEffect::Pause,
            SpeechEffect::CancelKeepAlive,
            notify(NoticeLevel::Info, "Narration paused"),
        ]
    }

    pub fn resume(&mut self) -> Vec<SpeechEffect> {
        if self.state != SpeechState::Paused {
            debug!(state = ?self.state, "Resume ignored");
            return Vec::new();
        }
        self.state = SpeechState::Speaking;
        info!(chunk = self.current, "Narration resumed");
        let mut effects = vec![SpeechEffect::Resume];
        effects.extend(self.schedule_keepalive());
        effects.push(notify(NoticeLevel::Info, "Narration resumed"));
        effects
    }

    /// Always succeeds, whatever the state.
    pub fn stop(&mut self) -> Vec<SpeechEffect> {
        if self.is_active() {
            info!(chunk = self.current, "Narration stopped");
        }
        self.generation += 1;
        self.finish();
        vec![SpeechEffect::Cancel, SpeechEffect::CancelKeepAlive]
    }

    pub fn toggle(&mut self, text: &str) -> Vec<SpeechEffect> {
        match self.state {
            SpeechState::Idle => self.speak(text, 0),
            SpeechState::Speaking => self.pause(),
            SpeechState::Paused => self.resume(),
        }
    }

    pub fn on_keepalive_tick(&mut self, generation: u64) -> Vec<SpeechEffect> {
        if generation != self.generation || self.state != SpeechState::Speaking {
            debug!(generation, state = ?self.state, "Skipping keep-alive");
            return Vec::new();
        }
        debug!(generation, chunk = self.current, "Speech keep-alive");
        vec![SpeechEffect::KeepAlive]
    }

    fn is_current(&self, generation: u64, chunk: usize) -> bool {
        generation == self.generation && chunk == self.current && self.is_active()
    }

    fn finish(&mut self) {
        self.state = SpeechState::Idle;
        self.current = 0;
    }

    fn schedule_keepalive(&self) -> Option<SpeechEffect> {
        self.options
            .keepalive_interval
            .map(|interval| SpeechEffect::ScheduleKeepAlive {
                generation: self.generation,
                interval,
            })
    }

    fn utterance(&self) -> Utterance {
        Utterance {
            generation: self.generation,
            chunk_index: self.current,
            text: self.chunks[self.current].clone(),
            voice: self.selected_voice().map(|voice| voice.name.clone()),
            rate: self.params.rate,
            pitch: self.params.pitch,
            volume: self.params.volume,
        }
    }
}

fn notify(level: NoticeLevel, message: impl Into<String>) -> SpeechEffect {
    SpeechEffect::Notify(Notice::new(level, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PARAGRAPHS: &str = "第一段文字。\n第二段文字。";

    fn options(keepalive: Option<Duration>) -> SpeechOptions {
        SpeechOptions {
            max_chunk_len: 160,
            narration_languages: vec!["zh".to_string()],
            keepalive_interval: keepalive,
        }
    }

    fn session() -> SpeechSession {
        SpeechSession::new(options(None), true, SpeechParams::from(&ReaderSettings::default()))
    }

    fn spoken(effects: &[SpeechEffect]) -> Vec<&Utterance> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                SpeechEffect::Speak(utterance) => Some(utterance),
                _ => None,
            })
            .collect()
    }

    fn notices(effects: &[SpeechEffect]) -> Vec<&Notice> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                SpeechEffect::Notify(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn two_paragraphs_narrate_in_order_then_finish() {
        let mut session = session();
        let effects = session.speak(TWO_PARAGRAPHS, 0);
        assert_eq!(effects[0], SpeechEffect::Cancel);
        let first = spoken(&effects)[0].clone();
        assert_eq!(first.text, "第一段文字。");
        assert_eq!(session.total_chunks(), 2);
        assert_eq!(session.state(), SpeechState::Speaking);

        let effects = session.on_chunk_finished(first.generation, 0);
        assert_eq!(spoken(&effects)[0].text, "第二段文字。");
        assert_eq!(session.current_chunk_index(), 1);

        let effects = session.on_chunk_finished(first.generation, 1);
        assert_eq!(notices(&effects)[0].level, NoticeLevel::Success);
        assert_eq!(session.state(), SpeechState::Idle);
        assert_eq!(session.current_chunk_index(), 0);
    }

    #[test]
    fn empty_text_warns_without_state_change() {
        let mut session = session();
        let effects = session.speak("  \n ", 0);
        assert_eq!(notices(&effects)[0].level, NoticeLevel::Warning);
        assert!(spoken(&effects).is_empty());
        assert_eq!(session.state(), SpeechState::Idle);
    }

    #[test]
    fn unsupported_platform_warns_once() {
        let mut session =
            SpeechSession::new(options(None), false, SpeechParams::from(&ReaderSettings::default()));
        let first = session.speak(TWO_PARAGRAPHS, 0);
        assert_eq!(first.len(), 1);
        assert_eq!(notices(&first)[0].level, NoticeLevel::Warning);
        assert!(session.speak(TWO_PARAGRAPHS, 0).is_empty());
        assert!(session.toggle(TWO_PARAGRAPHS).is_empty());
        assert_eq!(session.state(), SpeechState::Idle);
    }

    #[test]
    fn start_chunk_out_of_range_starts_at_zero() {
        let mut session = session();
        let effects = session.speak(TWO_PARAGRAPHS, 1);
        assert_eq!(spoken(&effects)[0].chunk_index, 1);
        let effects = session.speak(TWO_PARAGRAPHS, 7);
        assert_eq!(spoken(&effects)[0].chunk_index, 0);
    }

    #[test]
    fn stop_discards_late_completion() {
        let mut session = session();
        let generation = spoken(&session.speak(TWO_PARAGRAPHS, 0))[0].generation;
        assert_eq!(
            session.stop(),
            vec![SpeechEffect::Cancel, SpeechEffect::CancelKeepAlive]
        );
        assert!(session.on_chunk_finished(generation, 0).is_empty());
        assert_eq!(session.state(), SpeechState::Idle);
        assert_eq!(session.current_chunk_index(), 0);
    }

    #[test]
    fn restart_ignores_previous_run_callbacks() {
        let mut session = session();
        let old = spoken(&session.speak(TWO_PARAGRAPHS, 0))[0].generation;
        let new = spoken(&session.speak(TWO_PARAGRAPHS, 0))[0].generation;
        assert_ne!(old, new);
        assert!(session.on_chunk_finished(old, 0).is_empty());
        assert_eq!(session.current_chunk_index(), 0);
        assert_eq!(spoken(&session.on_chunk_finished(new, 0)).len(), 1);
    }

    #[test]
    fn cancellation_errors_are_swallowed() {
        let mut session = session();
        let generation = spoken(&session.speak(TWO_PARAGRAPHS, 0))[0].generation;
        assert!(session
            .on_chunk_failed(generation, 0, &SpeechErrorKind::Interrupted)
            .is_empty());
        assert_eq!(session.state(), SpeechState::Speaking);
    }

    #[test]
    fn real_errors_go_idle_and_notify() {
        let mut session = session();
        let generation = spoken(&session.speak(TWO_PARAGRAPHS, 0))[0].generation;
        let effects =
            session.on_chunk_failed(generation, 0, &SpeechErrorKind::Failed("audio-busy".into()));
        let notice = notices(&effects)[0];
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("audio-busy"));
        assert_eq!(session.state(), SpeechState::Idle);
        assert!(session.on_chunk_finished(generation, 0).is_empty());
    }

    #[test]
    fn toggle_cycles_speak_pause_resume() {
        let mut session = session();
        session.toggle(TWO_PARAGRAPHS);
        assert_eq!(session.state(), SpeechState::Speaking);
        let effects = session.toggle(TWO_PARAGRAPHS);
        assert_eq!(effects[0], SpeechEffect::Pause);
        assert_eq!(session.state(), SpeechState::Paused);
        let effects = session.toggle(TWO_PARAGRAPHS);
        assert_eq!(effects[0], SpeechEffect::Resume);
        assert_eq!(session.state(), SpeechState::Speaking);
    }

    #[test]
    fn pause_and_resume_outside_their_state_are_noops() {
        let mut session = session();
        assert!(session.pause().is_empty());
        assert!(session.resume().is_empty());
        session.speak(TWO_PARAGRAPHS, 0);
        assert!(session.resume().is_empty());
    }

    #[test]
    fn keepalive_runs_only_while_speaking() {
        let interval = Duration::from_secs(10);
        let mut session =
            SpeechSession::new(options(Some(interval)), true, SpeechParams::from(&ReaderSettings::default()));
        let effects = session.speak(TWO_PARAGRAPHS, 0);
        let generation = session.generation();
        assert!(effects.contains(&SpeechEffect::ScheduleKeepAlive { generation, interval }));
        assert_eq!(session.on_keepalive_tick(generation), vec![SpeechEffect::KeepAlive]);

        session.pause();
        assert!(session.on_keepalive_tick(generation).is_empty());
        session.resume();
        assert_eq!(session.on_keepalive_tick(generation), vec![SpeechEffect::KeepAlive]);

        session.stop();
        assert!(session.on_keepalive_tick(generation).is_empty());
    }

    #[test]
    fn utterances_carry_voice_and_params() {
        let mut settings = ReaderSettings::default();
        settings.speech_rate = 1.5;
        settings.speech_voice = Some("Mei-Jia".to_string());
        let mut session = session();
        session.set_params(SpeechParams::from(&settings));
        session.set_voices(vec![
            Voice::new("Ting-Ting", "zh-CN", true),
            Voice::new("Mei-Jia", "zh-TW", false),
        ]);
        let effects = session.speak(TWO_PARAGRAPHS, 0);
        let utterance = spoken(&effects)[0];
        assert_eq!(utterance.voice.as_deref(), Some("Mei-Jia"));
        assert!((utterance.rate - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn oversized_keepalive_interval_is_clamped() {
        let mut config = AppConfig::default();
        config.stall_keepalive = crate::config::KeepAliveMode::Always;
        config.keepalive_interval_secs = 1e30;
        assert_eq!(
            SpeechOptions::from_config(&config, false).keepalive_interval,
            Some(Duration::from_secs(3600))
        );
        config.keepalive_interval_secs = f32::INFINITY;
        assert_eq!(
            SpeechOptions::from_config(&config, false).keepalive_interval,
            Some(Duration::from_secs(10))
        );
    }

    #[test]
        fn keepalive_follows_platform_need_in_auto_mode() {
        let config = AppConfig::default();
        assert!(SpeechOptions::from_config(&config, true).keepalive_interval.is_some());
        assert!(SpeechOptions::from_config(&config, false).keepalive_interval.is_none());
    }
}
