//! Configuration loading for the reader.
//!
//! Host-level settings (log level, storage locations, scroll pacing,
//! narration backend, ambient light/dark source) are centralized here and
//! loaded from `conf/config.toml` if present. Any missing or invalid entries fall back to
//! sensible defaults so the reader can still launch. Per-reader display
//! preferences live in [`crate::settings`] instead.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, serialize_config};
pub use models::{AppConfig, LogLevel};
#[cfg(test)]
pub use models::{AmbientPreference, KeepAliveMode};
