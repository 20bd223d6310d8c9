use super::defaults;
use super::models::{AmbientPreference, AppConfig, KeepAliveMode, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    scroll: ScrollConfig,
    #[serde(default)]
    speech: SpeechConfig,
    #[serde(default)]
    appearance: AppearanceConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            store_dir: tables.storage.store_dir,
            corpus_dir: tables.storage.corpus_dir,
            settings_key: tables.storage.settings_key,
            base_interval_ms: tables.scroll.base_interval_ms,
            interval_step_ms: tables.scroll.interval_step_ms,
            min_interval_ms: tables.scroll.min_interval_ms,
            tick_increment_px: tables.scroll.tick_increment_px,
            user_scroll_window_ms: tables.scroll.user_scroll_window_ms,
            viewport_height_px: tables.scroll.viewport_height_px,
            line_height_px: tables.scroll.line_height_px,
            max_chunk_len: tables.speech.max_chunk_len,
            narration_languages: tables.speech.narration_languages,
            stall_keepalive: tables.speech.stall_keepalive,
            keepalive_interval_secs: tables.speech.keepalive_interval_secs,
            ambient_mode: tables.appearance.ambient_mode,
            tts_model_path: tables.speech.model_path,
            tts_espeak_path: tables.speech.espeak_path,
            tts_cache_dir: tables.speech.cache_dir,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            storage: StorageConfig {
                store_dir: config.store_dir.clone(),
                corpus_dir: config.corpus_dir.clone(),
                settings_key: config.settings_key.clone(),
            },
            scroll: ScrollConfig {
                base_interval_ms: config.base_interval_ms,
                interval_step_ms: config.interval_step_ms,
                min_interval_ms: config.min_interval_ms,
                tick_increment_px: config.tick_increment_px,
                user_scroll_window_ms: config.user_scroll_window_ms,
                viewport_height_px: config.viewport_height_px,
                line_height_px: config.line_height_px,
            },
            speech: SpeechConfig {
                max_chunk_len: config.max_chunk_len,
                narration_languages: config.narration_languages.clone(),
                stall_keepalive: config.stall_keepalive,
                keepalive_interval_secs: config.keepalive_interval_secs,
                model_path: config.tts_model_path.clone(),
                espeak_path: config.tts_espeak_path.clone(),
                cache_dir: config.tts_cache_dir.clone(),
            },
            appearance: AppearanceConfig {
                ambient_mode: config.ambient_mode,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_store_dir")]
    store_dir: String,
    #[serde(default = "defaults::default_corpus_dir")]
    corpus_dir: String,
    #[serde(default = "defaults::default_settings_key")]
    settings_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            store_dir: defaults::default_store_dir(),
            corpus_dir: defaults::default_corpus_dir(),
            settings_key: defaults::default_settings_key(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ScrollConfig {
    #[serde(default = "defaults::default_base_interval_ms")]
    base_interval_ms: u64,
    #[serde(default = "defaults::default_interval_step_ms")]
    interval_step_ms: u64,
    #[serde(default = "defaults::default_min_interval_ms")]
    min_interval_ms: u64,
    #[serde(default = "defaults::default_tick_increment_px")]
    tick_increment_px: f32,
    #[serde(default = "defaults::default_user_scroll_window_ms")]
    user_scroll_window_ms: u64,
    #[serde(default = "defaults::default_viewport_height_px")]
    viewport_height_px: f32,
    #[serde(default = "defaults::default_line_height_px")]
    line_height_px: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        ScrollConfig {
            base_interval_ms: defaults::default_base_interval_ms(),
            interval_step_ms: defaults::default_interval_step_ms(),
            min_interval_ms: defaults::default_min_interval_ms(),
            tick_increment_px: defaults::default_tick_increment_px(),
            user_scroll_window_ms: defaults::default_user_scroll_window_ms(),
            viewport_height_px: defaults::default_viewport_height_px(),
            line_height_px: defaults::default_line_height_px(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct SpeechConfig {
    #[serde(default = "defaults::default_max_chunk_len")]
    max_chunk_len: usize,
    #[serde(default = "defaults::default_narration_languages")]
    narration_languages: Vec<String>,
    #[serde(default)]
    stall_keepalive: KeepAliveMode,
    #[serde(default = "defaults::default_keepalive_interval_secs")]
    keepalive_interval_secs: f32,
    #[serde(default = "defaults::default_tts_model")]
    model_path: String,
    #[serde(default = "defaults::default_tts_espeak_path")]
    espeak_path: String,
    #[serde(default = "defaults::default_tts_cache_dir")]
    cache_dir: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            max_chunk_len: defaults::default_max_chunk_len(),
            narration_languages: defaults::default_narration_languages(),
            stall_keepalive: KeepAliveMode::default(),
            keepalive_interval_secs: defaults::default_keepalive_interval_secs(),
            model_path: defaults::default_tts_model(),
            espeak_path: defaults::default_tts_espeak_path(),
            cache_dir: defaults::default_tts_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
struct AppearanceConfig {
    #[serde(default)]
    ambient_mode: AmbientPreference,
}
