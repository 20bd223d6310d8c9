use super::models::{AppConfig, MAX_KEEPALIVE_INTERVAL_SECS};
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            sanitize(cfg)
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            AppConfig::default()
        }
    }
}

/// Parse the sectioned TOML layout (`[logging]`, `[storage]`, `[scroll]`, `[speech]`).
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let tables: ConfigTables = toml::from_str(contents).context("Parsing config tables")?;
    Ok(tables.into())
}

pub fn serialize_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(&ConfigTables::from(config)).context("Serializing config tables")
}

fn sanitize(mut config: AppConfig) -> AppConfig {
    config.min_interval_ms = config.min_interval_ms.max(1);
    config.max_chunk_len = config.max_chunk_len.max(1);
    if !config.tick_increment_px.is_finite() || config.tick_increment_px <= 0.0 {
        config.tick_increment_px = super::defaults::default_tick_increment_px();
    }
    if !config.keepalive_interval_secs.is_finite() || config.keepalive_interval_secs < 1.0 {
        config.keepalive_interval_secs = super::defaults::default_keepalive_interval_secs();
    }
    config.keepalive_interval_secs = config.keepalive_interval_secs.min(MAX_KEEPALIVE_INTERVAL_SECS);
    config
}
