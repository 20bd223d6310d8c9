pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}

pub(crate) fn default_store_dir() -> String {
    ".cache/prefs".to_string()
}

pub(crate) fn default_corpus_dir() -> String {
    "books".to_string()
}

pub(crate) fn default_settings_key() -> String {
    "readerSettings".to_string()
}

pub(crate) fn default_base_interval_ms() -> u64 {
    100
}

pub(crate) fn default_interval_step_ms() -> u64 {
    20
}

pub(crate) fn default_min_interval_ms() -> u64 {
    10
}

pub(crate) fn default_tick_increment_px() -> f32 {
    1.0
}

pub(crate) fn default_user_scroll_window_ms() -> u64 {
    2000
}

pub(crate) fn default_viewport_height_px() -> f32 {
    720.0
}

pub(crate) fn default_line_height_px() -> f32 {
    28.0
}

pub(crate) fn default_max_chunk_len() -> usize {
    160
}

pub(crate) fn default_narration_languages() -> Vec<String> {
    vec!["zh".to_string(), "cmn".to_string()]
}

pub(crate) fn default_keepalive_interval_secs() -> f32 {
    10.0
}

pub(crate) fn default_tts_model() -> String {
    "/usr/share/piper-voices/zh/zh_CN/huayan/medium/zh_CN-huayan-medium.onnx".to_string()
}

pub(crate) fn default_tts_espeak_path() -> String {
    "/usr/share".to_string()
}

pub(crate) fn default_tts_cache_dir() -> String {
    ".cache/tts".to_string()
}
