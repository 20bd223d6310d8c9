//! Reader display preferences and their reconciliation rules.
//!
//! The [`ReaderSettings`] record is the single source of truth for font,
//! colours and auto-scroll/narration preferences. Colours are either derived
//! from the eye-protection and ambient dark-mode flags or pinned by the user;
//! `colors_pinned` records which, and once set only [`SettingsEvent::Reset`]
//! clears it.

mod reconcile;
mod reconciler;

pub use reconcile::{SettingsEvent, reconcile};
pub use reconciler::SettingsReconciler;

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use ts_rs::TS;

pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 32;
pub const MIN_LINE_HEIGHT: f32 = 1.3;
pub const MAX_LINE_HEIGHT: f32 = 2.5;
pub const MIN_AUTO_SCROLL_SPEED: u8 = 1;
pub const MAX_AUTO_SCROLL_SPEED: u8 = 5;
pub const MIN_SPEECH_RATE: f32 = 0.1;
pub const MAX_SPEECH_RATE: f32 = 10.0;
pub const MAX_SPEECH_PITCH: f32 = 2.0;
pub const MAX_SPEECH_VOLUME: f32 = 1.0;

/// `#rrggbb` colour value; serializes as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Color(#[ts(type = "string")] String);

impl Color {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_static(hex: &'static str) -> Self {
        Color(hex.to_string())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix('#')
            .ok_or_else(|| format!("colour `{trimmed}` must start with '#'"))?;
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(format!("colour `{trimmed}` must have 3 or 6 hex digits")),
        };
        if !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("colour `{trimmed}` contains non-hex digits"));
        }
        Ok(Color(format!("#{}", expanded.to_ascii_lowercase())))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A background/text colour pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPair {
    pub background: Color,
    pub text: Color,
}

impl ColorPair {
    pub fn standard() -> Self {
        ColorPair {
            background: Color::from_static("#fff8f5"),
            text: Color::from_static("#333333"),
        }
    }

    pub fn eye_protection() -> Self {
        ColorPair {
            background: Color::from_static("#f0f8e6"),
            text: Color::from_static("#3a3a3a"),
        }
    }

    pub fn dark() -> Self {
        ColorPair {
            background: Color::from_static("#2c2c2c"),
            text: Color::from_static("#e8e8e8"),
        }
    }
}

/// System-level light/dark preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbientMode {
    Light,
    Dark,
}

impl AmbientMode {
    pub fn is_dark(self) -> bool {
        matches!(self, AmbientMode::Dark)
    }
}

/// Persisted reader preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct ReaderSettings {
    pub font_size: u32,
    pub line_height: f32,
    pub background: Color,
    pub text_color: Color,
    pub font_family: String,
    pub eye_protection_enabled: bool,
    pub auto_scroll_enabled: bool,
    pub auto_scroll_speed: u8,
    /// Mirrors the ambient mode; never set directly by the user.
    pub dark_mode_enabled: bool,
    /// Set by any direct colour edit; disables colour derivation.
    pub colors_pinned: bool,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub speech_volume: f32,
    #[ts(optional)]
    pub speech_voice: Option<String>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        let colors = ColorPair::standard();
        ReaderSettings {
            font_size: 18,
            line_height: 1.8,
            background: colors.background,
            text_color: colors.text,
            font_family: "sans-serif".to_string(),
            eye_protection_enabled: false,
            auto_scroll_enabled: false,
            auto_scroll_speed: 2,
            dark_mode_enabled: false,
            colors_pinned: false,
            speech_rate: 1.0,
            speech_pitch: 1.0,
            speech_volume: 1.0,
            speech_voice: None,
        }
    }
}

impl ReaderSettings {
    pub fn colors(&self) -> ColorPair {
        ColorPair {
            background: self.background.clone(),
            text: self.text_color.clone(),
        }
    }

    pub(crate) fn set_colors(&mut self, pair: ColorPair) {
        self.background = pair.background;
        self.text_color = pair.text;
    }

    /// Pull every field back into its valid range (stored records may be stale).
    pub fn clamped(mut self) -> Self {
        self.font_size = clamp_font_size(self.font_size);
        self.line_height = clamp_line_height(self.line_height);
        self.auto_scroll_speed = clamp_speed(self.auto_scroll_speed);
        self.speech_rate = clamp_unit(self.speech_rate, MIN_SPEECH_RATE, MAX_SPEECH_RATE, 1.0);
        self.speech_pitch = clamp_unit(self.speech_pitch, 0.0, MAX_SPEECH_PITCH, 1.0);
        self.speech_volume = clamp_unit(self.speech_volume, 0.0, MAX_SPEECH_VOLUME, 1.0);
        if self.font_family.trim().is_empty() {
            self.font_family = ReaderSettings::default().font_family;
        }
        self
    }
}

/// Typed form of a single-key settings update.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingUpdate {
    FontSize(u32),
    LineHeight(f32),
    Background(Color),
    TextColor(Color),
    FontFamily(String),
    EyeProtection(bool),
    AutoScroll(bool),
    AutoScrollSpeed(u8),
    SpeechRate(f32),
    SpeechPitch(f32),
    SpeechVolume(f32),
    SpeechVoice(Option<String>),
}

impl SettingUpdate {
    pub fn is_color(&self) -> bool {
        matches!(self, SettingUpdate::Background(_) | SettingUpdate::TextColor(_))
    }

    /// Parse `update(key, value)` as typed by a host, keyed by the record's
    /// camelCase field names.
    pub fn from_key_value(key: &str, value: &str) -> Result<Self, String> {
        let value = value.trim();
        let number = |value: &str| {
            value
                .parse::<f32>()
                .map_err(|_| format!("`{key}` expects a number, got `{value}`"))
        };
        let flag = |value: &str| match value {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" => Ok(false),
            _ => Err(format!("`{key}` expects true or false, got `{value}`")),
        };
        let update = match key.trim() {
            "fontSize" => SettingUpdate::FontSize(number(value)?.round().max(0.0) as u32),
            "lineHeight" => SettingUpdate::LineHeight(number(value)?),
            "background" => SettingUpdate::Background(value.parse()?),
            "textColor" => SettingUpdate::TextColor(value.parse()?),
            "fontFamily" => SettingUpdate::FontFamily(value.to_string()),
            "eyeProtectionEnabled" => SettingUpdate::EyeProtection(flag(value)?),
            "autoScrollEnabled" => SettingUpdate::AutoScroll(flag(value)?),
            "autoScrollSpeed" => {
                SettingUpdate::AutoScrollSpeed(number(value)?.round().clamp(0.0, 255.0) as u8)
            }
            "speechRate" => SettingUpdate::SpeechRate(number(value)?),
            "speechPitch" => SettingUpdate::SpeechPitch(number(value)?),
            "speechVolume" => SettingUpdate::SpeechVolume(number(value)?),
            "speechVoice" => SettingUpdate::SpeechVoice(
                (!value.is_empty() && value != "none").then(|| value.to_string()),
            ),
            other => return Err(format!("unknown setting `{other}`")),
        };
        Ok(update)
    }

    pub fn key(&self) -> &'static str {
        match self {
            SettingUpdate::FontSize(_) => "fontSize",
            SettingUpdate::LineHeight(_) => "lineHeight",
            SettingUpdate::Background(_) => "background",
            SettingUpdate::TextColor(_) => "textColor",
            SettingUpdate::FontFamily(_) => "fontFamily",
            SettingUpdate::EyeProtection(_) => "eyeProtectionEnabled",
            SettingUpdate::AutoScroll(_) => "autoScrollEnabled",
            SettingUpdate::AutoScrollSpeed(_) => "autoScrollSpeed",
            SettingUpdate::SpeechRate(_) => "speechRate",
            SettingUpdate::SpeechPitch(_) => "speechPitch",
            SettingUpdate::SpeechVolume(_) => "speechVolume",
            SettingUpdate::SpeechVoice(_) => "speechVoice",
        }
    }
}

pub(crate) fn clamp_font_size(size: u32) -> u32 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

pub(crate) fn clamp_line_height(height: f32) -> f32 {
    if !height.is_finite() {
        return ReaderSettings::default().line_height;
    }
    let stepped = (height * 10.0).round() / 10.0;
    stepped.clamp(MIN_LINE_HEIGHT, MAX_LINE_HEIGHT)
}

pub(crate) fn clamp_speed(level: u8) -> u8 {
    level.clamp(MIN_AUTO_SCROLL_SPEED, MAX_AUTO_SCROLL_SPEED)
}

pub(crate) fn clamp_unit(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
