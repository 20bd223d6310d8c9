use super::{
    AmbientMode, ColorPair, ReaderSettings, SettingUpdate, clamp_font_size, clamp_line_height,
    clamp_speed, clamp_unit, MAX_SPEECH_PITCH, MAX_SPEECH_RATE, MAX_SPEECH_VOLUME,
    MIN_SPEECH_RATE,
};
use tracing::{debug, info};

/// Everything that can change the settings record.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEvent {
    Update(SettingUpdate),
    ToggleEyeProtection,
    ToggleAutoScroll,
    Reset,
    AmbientModeChanged(AmbientMode),
}

/// Colour pair implied by the mode flags.
fn derived_colors(dark_mode: bool, eye_protection: bool) -> ColorPair {
    if dark_mode {
        ColorPair::dark()
    } else if eye_protection {
        ColorPair::eye_protection()
    } else {
        ColorPair::standard()
    }
}

/// Pure reconciliation step: `(current, event) -> next`.
pub fn reconcile(current: &ReaderSettings, event: &SettingsEvent) -> ReaderSettings {
    let mut next = current.clone();
    match event {
        SettingsEvent::Update(update) => apply_update(&mut next, update.clone()),
        SettingsEvent::ToggleEyeProtection => {
            next.eye_protection_enabled = !current.eye_protection_enabled;
            if !next.colors_pinned {
                next.set_colors(derived_colors(
                    next.dark_mode_enabled,
                    next.eye_protection_enabled,
                ));
            }
            info!(
                enabled = next.eye_protection_enabled,
                pinned = next.colors_pinned,
                "Toggled eye protection"
            );
        }
        SettingsEvent::ToggleAutoScroll => {
            next.auto_scroll_enabled = !current.auto_scroll_enabled;
            info!(enabled = next.auto_scroll_enabled, "Toggled auto-scroll");
        }
        SettingsEvent::Reset => {
            info!("Resetting reader settings to defaults");
            next = ReaderSettings {
                // The ambient mode is not a user preference; keep tracking it.
                dark_mode_enabled: current.dark_mode_enabled,
                ..ReaderSettings::default()
            };
            if next.dark_mode_enabled {
                next.set_colors(derived_colors(true, false));
            }
        }
        SettingsEvent::AmbientModeChanged(mode) => {
            let dark = mode.is_dark();
            if dark == current.dark_mode_enabled {
                debug!(dark, "Ambient mode unchanged; skipping derivation");
                return next;
            }
            next.dark_mode_enabled = dark;
            if next.colors_pinned {
                debug!(dark, "Colours pinned by user; ambient change leaves them alone");
            } else {
                next.set_colors(derived_colors(dark, next.eye_protection_enabled));
                info!(dark, background = %next.background, "Derived colours from ambient mode");
            }
        }
    }
    next
}

fn apply_update(settings: &mut ReaderSettings, update: SettingUpdate) {
    debug!(key = update.key(), ?update, "Updating setting");
    if update.is_color() {
        settings.colors_pinned = true;
    }
    match update {
        SettingUpdate::FontSize(size) => settings.font_size = clamp_font_size(size),
        SettingUpdate::LineHeight(height) => settings.line_height = clamp_line_height(height),
        SettingUpdate::Background(color) => settings.background = color,
        SettingUpdate::TextColor(color) => settings.text_color = color,
        SettingUpdate::FontFamily(family) => {
            if !family.trim().is_empty() {
                settings.font_family = family.trim().to_string();
            }
        }
        SettingUpdate::EyeProtection(enabled) => settings.eye_protection_enabled = enabled,
        SettingUpdate::AutoScroll(enabled) => settings.auto_scroll_enabled = enabled,
        SettingUpdate::AutoScrollSpeed(level) => settings.auto_scroll_speed = clamp_speed(level),
        SettingUpdate::SpeechRate(rate) => {
            settings.speech_rate = clamp_unit(rate, MIN_SPEECH_RATE, MAX_SPEECH_RATE, 1.0);
        }
        SettingUpdate::SpeechPitch(pitch) => {
            settings.speech_pitch = clamp_unit(pitch, 0.0, MAX_SPEECH_PITCH, 1.0);
        }
        SettingUpdate::SpeechVolume(volume) => {
            settings.speech_volume = clamp_unit(volume, 0.0, MAX_SPEECH_VOLUME, 1.0);
        }
        SettingUpdate::SpeechVoice(voice) => {
            settings.speech_voice = voice.filter(|name| !name.trim().is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Color;

    fn color(hex: &str) -> Color {
        hex.parse().expect("valid colour")
    }

    #[test]
    fn double_eye_toggle_round_trips_in_light_mode() {
        let start = ReaderSettings::default();
        let once = reconcile(&start, &SettingsEvent::ToggleEyeProtection);
        assert_eq!(once.colors(), ColorPair::eye_protection());
        let twice = reconcile(&once, &SettingsEvent::ToggleEyeProtection);
        assert_eq!(twice.colors(), start.colors());
        assert!(!twice.eye_protection_enabled);
    }

    #[test]
    fn double_eye_toggle_round_trips_in_dark_mode() {
        let dark = reconcile(
            &ReaderSettings::default(),
            &SettingsEvent::AmbientModeChanged(AmbientMode::Dark),
        );
        assert_eq!(dark.colors(), ColorPair::dark());
        let once = reconcile(&dark, &SettingsEvent::ToggleEyeProtection);
        let twice = reconcile(&once, &SettingsEvent::ToggleEyeProtection);
        assert_eq!(twice.colors(), dark.colors());
    }

    #[test]
    fn colour_edit_pins_colours_against_ambient_changes() {
        let edited = reconcile(
            &ReaderSettings::default(),
            &SettingsEvent::Update(SettingUpdate::Background(color("#101010"))),
        );
        assert!(edited.colors_pinned);
        let dark = reconcile(&edited, &SettingsEvent::AmbientModeChanged(AmbientMode::Dark));
        assert!(dark.dark_mode_enabled);
        assert_eq!(dark.background, color("#101010"));
        assert_eq!(dark.text_color, ReaderSettings::default().text_color);
        let light = reconcile(&dark, &SettingsEvent::AmbientModeChanged(AmbientMode::Light));
        assert_eq!(light.colors(), edited.colors());
    }

    #[test]
    fn text_colour_edit_also_pins() {
        let edited = reconcile(
            &ReaderSettings::default(),
            &SettingsEvent::Update(SettingUpdate::TextColor(color("#222222"))),
        );
        let toggled = reconcile(&edited, &SettingsEvent::ToggleEyeProtection);
        assert!(toggled.eye_protection_enabled);
        assert_eq!(toggled.colors(), edited.colors());
    }

    #[test]
    fn ambient_light_with_eye_protection_uses_eye_pair() {
        let mut settings = ReaderSettings::default();
        settings.eye_protection_enabled = true;
        settings.dark_mode_enabled = true;
        let light = reconcile(&settings, &SettingsEvent::AmbientModeChanged(AmbientMode::Light));
        assert_eq!(light.colors(), ColorPair::eye_protection());
    }

    #[test]
    fn repeated_ambient_mode_is_not_a_transition() {
        let mut settings = ReaderSettings::default();
        settings.background = color("#abcdef");
        let same = reconcile(&settings, &SettingsEvent::AmbientModeChanged(AmbientMode::Light));
        assert_eq!(same, settings);
    }

    #[test]
    fn reset_clears_pin_and_keeps_ambient_mode() {
        let mut settings = reconcile(
            &ReaderSettings::default(),
            &SettingsEvent::Update(SettingUpdate::Background(color("#000000"))),
        );
        settings.font_size = 30;
        settings.dark_mode_enabled = true;
        let reset = reconcile(&settings, &SettingsEvent::Reset);
        assert!(!reset.colors_pinned);
        assert_eq!(reset.font_size, 18);
        assert!(reset.dark_mode_enabled);
        assert_eq!(reset.colors(), ColorPair::dark());

        let again = reconcile(&reset, &SettingsEvent::Reset);
        assert_eq!(again, reset);
    }

    #[test]
    fn numeric_updates_are_clamped() {
        let settings = ReaderSettings::default();
        let big = reconcile(&settings, &SettingsEvent::Update(SettingUpdate::FontSize(99)));
        assert_eq!(big.font_size, 32);
        let slow = reconcile(&settings, &SettingsEvent::Update(SettingUpdate::AutoScrollSpeed(0)));
        assert_eq!(slow.auto_scroll_speed, 1);
        let tall = reconcile(&settings, &SettingsEvent::Update(SettingUpdate::LineHeight(3.7)));
        assert!((tall.line_height - 2.5).abs() < 1e-6);
    }

    #[test]
    fn toggle_auto_scroll_flips_flag_only() {
        let settings = ReaderSettings::default();
        let on = reconcile(&settings, &SettingsEvent::ToggleAutoScroll);
        assert!(on.auto_scroll_enabled);
        assert_eq!(on.colors(), settings.colors());
    }
}
