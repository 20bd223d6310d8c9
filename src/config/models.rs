use crate::settings::AmbientMode;
use serde::Deserialize;
use std::time::Duration;

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_store_dir")]
    pub store_dir: String,
    #[serde(default = "crate::config::defaults::default_corpus_dir")]
    pub corpus_dir: String,
    #[serde(default = "crate::config::defaults::default_settings_key")]
    pub settings_key: String,
    #[serde(default = "crate::config::defaults::default_base_interval_ms")]
    pub base_interval_ms: u64,
    #[serde(default = "crate::config::defaults::default_interval_step_ms")]
    pub interval_step_ms: u64,
    #[serde(default = "crate::config::defaults::default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "crate::config::defaults::default_tick_increment_px")]
    pub tick_increment_px: f32,
    #[serde(default = "crate::config::defaults::default_user_scroll_window_ms")]
    pub user_scroll_window_ms: u64,
    #[serde(default = "crate::config::defaults::default_viewport_height_px")]
    pub viewport_height_px: f32,
    #[serde(default = "crate::config::defaults::default_line_height_px")]
    pub line_height_px: f32,
    #[serde(default = "crate::config::defaults::default_max_chunk_len")]
    pub max_chunk_len: usize,
    #[serde(default = "crate::config::defaults::default_narration_languages")]
    pub narration_languages: Vec<String>,
    #[serde(default)]
    pub stall_keepalive: KeepAliveMode,
    #[serde(default = "crate::config::defaults::default_keepalive_interval_secs")]
    pub keepalive_interval_secs: f32,
    #[serde(default)]
    pub ambient_mode: AmbientPreference,
    #[serde(default = "crate::config::defaults::default_tts_model")]
    pub tts_model_path: String,
    #[serde(default = "crate::config::defaults::default_tts_espeak_path")]
    pub tts_espeak_path: String,
    #[serde(default = "crate::config::defaults::default_tts_cache_dir")]
    pub tts_cache_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            store_dir: crate::config::defaults::default_store_dir(),
            corpus_dir: crate::config::defaults::default_corpus_dir(),
            settings_key: crate::config::defaults::default_settings_key(),
            base_interval_ms: crate::config::defaults::default_base_interval_ms(),
            interval_step_ms: crate::config::defaults::default_interval_step_ms(),
            min_interval_ms: crate::config::defaults::default_min_interval_ms(),
            tick_increment_px: crate::config::defaults::default_tick_increment_px(),
            user_scroll_window_ms: crate::config::defaults::default_user_scroll_window_ms(),
            viewport_height_px: crate::config::defaults::default_viewport_height_px(),
            line_height_px: crate::config::defaults::default_line_height_px(),
            max_chunk_len: crate::config::defaults::default_max_chunk_len(),
            narration_languages: crate::config::defaults::default_narration_languages(),
            stall_keepalive: KeepAliveMode::Auto,
            keepalive_interval_secs: crate::config::defaults::default_keepalive_interval_secs(),
            ambient_mode: AmbientPreference::Auto,
            tts_model_path: crate::config::defaults::default_tts_model(),
            tts_espeak_path: crate::config::defaults::default_tts_espeak_path(),
            tts_cache_dir: crate::config::defaults::default_tts_cache_dir(),
        }
    }
}

/// Longest accepted keep-alive period, in seconds.
pub const MAX_KEEPALIVE_INTERVAL_SECS: f32 = 3600.0;

impl AppConfig {
    /// Keep-alive period, pulled into `1..=MAX_KEEPALIVE_INTERVAL_SECS`.
    pub fn keepalive_interval(&self) -> Duration {
        let secs = if self.keepalive_interval_secs.is_finite() {
            self.keepalive_interval_secs.clamp(1.0, MAX_KEEPALIVE_INTERVAL_SECS)
        } else {
            crate::config::defaults::default_keepalive_interval_secs()
        };
        Duration::from_secs_f32(secs)
    }
}

/// When to run the pause/resume keep-alive against the speech engine.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum KeepAliveMode {
    /// Only when the speech service reports it is prone to stalling.
    Auto,
    Always,
    Never,
}

impl Default for KeepAliveMode {
    fn default() -> Self {
        KeepAliveMode::Auto
    }
}

impl KeepAliveMode {
    pub fn enabled_for(self, service_needs_keepalive: bool) -> bool {
        match self {
            KeepAliveMode::Auto => service_needs_keepalive,
            KeepAliveMode::Always => true,
            KeepAliveMode::Never => false,
        }
    }
}

impl std::fmt::Display for KeepAliveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            KeepAliveMode::Auto => "auto",
            KeepAliveMode::Always => "always",
            KeepAliveMode::Never => "never",
        };
        write!(f, "{}", label)
    }
}

/// Source of the light/dark ambient mode.
#[derive(Debug, Clone, Copy, Default, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AmbientPreference {
    /// Follow the terminal's `COLORFGBG` hint; light when there is none.
    #[default]
    Auto,
    Light,
    Dark,
}

impl AmbientPreference {
    /// `colorfgbg` is the raw `COLORFGBG` value (`"fg;bg"` or
    /// `"fg;default;bg"`). ANSI backgrounds 0-6 and 8 count as dark.
    pub fn resolve(self, colorfgbg: Option<&str>) -> AmbientMode {
        match self {
            AmbientPreference::Light => AmbientMode::Light,
            AmbientPreference::Dark => AmbientMode::Dark,
            AmbientPreference::Auto => {
                let background = colorfgbg
                    .and_then(|raw| raw.rsplit(';').next())
                    .and_then(|bg| bg.trim().parse::<u8>().ok());
                match background {
                    Some(bg) if bg <= 6 || bg == 8 => AmbientMode::Dark,
                    _ => AmbientMode::Light,
                }
            }
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
