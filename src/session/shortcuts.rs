use super::{ReadingSession, SessionEvent};
use crate::settings::{AmbientMode, SettingUpdate};
use crate::store::KeyValueStore;

/// Font size change per `[`/`]` press.
const FONT_STEP: u32 = 2;

/// One line per command, shown by hosts that read commands from a terminal.
pub const COMMAND_HELP: &str = "Commands (then Enter): \
    space/Enter toggle narration, p pause, c continue, s stop narration, \
    a toggle auto-scroll, x stop auto-scroll, +/- scroll speed, [/] font size, \
    e eye protection, r reset settings, d/l dark/light ambient, q quit, \
    <setting>=<value> to set a preference";

impl<S: KeyValueStore> ReadingSession<S> {
    /// Map a typed host command onto the event it stands for. Relative
    /// commands (speed, font size) resolve against the current settings.
    pub(super) fn event_for_command(&self, raw: &str) -> Result<SessionEvent, String> {
        let command = normalize_command(raw);
        if let Some((key, value)) = command.split_once('=') {
            return SettingUpdate::from_key_value(key, value).map(SessionEvent::UpdateSetting);
        }

        let settings = self.reconciler.settings();
        let event = match command.to_ascii_lowercase().as_str() {
            "space" => SessionEvent::ToggleSpeech,
            "p" => SessionEvent::PauseSpeech,
            "c" => SessionEvent::ResumeSpeech,
            "s" => SessionEvent::StopSpeech,
            "a" => SessionEvent::ToggleAutoScroll,
            "x" => SessionEvent::StopAutoScroll,
            "+" => SessionEvent::UpdateSetting(SettingUpdate::AutoScrollSpeed(
                settings.auto_scroll_speed.saturating_add(1),
            )),
            "-" => SessionEvent::UpdateSetting(SettingUpdate::AutoScrollSpeed(
                settings.auto_scroll_speed.saturating_sub(1),
            )),
            "]" => SessionEvent::UpdateSetting(SettingUpdate::FontSize(
                settings.font_size.saturating_add(FONT_STEP),
            )),
            "[" => SessionEvent::UpdateSetting(SettingUpdate::FontSize(
                settings.font_size.saturating_sub(FONT_STEP),
            )),
            "e" => SessionEvent::ToggleEyeProtection,
            "r" => SessionEvent::ResetSettings,
            "d" => SessionEvent::AmbientModeChanged(AmbientMode::Dark),
            "l" => SessionEvent::AmbientModeChanged(AmbientMode::Light),
            "q" => SessionEvent::Shutdown,
            other => return Err(format!("unknown command `{other}`")),
        };
        Ok(event)
    }
}

/// A blank line (just Enter, or a typed space) is the space key.
fn normalize_command(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "space".to_string()
    } else {
        trimmed.replace("spacebar", "space")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::settings::SettingsReconciler;
    use crate::speech::SpeechOptions;
    use crate::store::{MemoryStore, PreferenceStore};

    fn session() -> ReadingSession<MemoryStore> {
        let config = AppConfig::default();
        let reconciler =
            SettingsReconciler::load(PreferenceStore::new(MemoryStore::new()), "readerSettings");
        let options = SpeechOptions::from_config(&config, false);
        ReadingSession::new(&config, reconciler, options, true, "正文。".to_string())
    }

    #[test]
    fn blank_line_toggles_narration() {
        assert_eq!(session().event_for_command("\n"), Ok(SessionEvent::ToggleSpeech));
        assert_eq!(session().event_for_command(" "), Ok(SessionEvent::ToggleSpeech));
    }

    #[test]
    fn letters_map_to_controls() {
        let session = session();
        assert_eq!(session.event_for_command("A"), Ok(SessionEvent::ToggleAutoScroll));
        assert_eq!(session.event_for_command("s"), Ok(SessionEvent::StopSpeech));
        assert_eq!(session.event_for_command("e"), Ok(SessionEvent::ToggleEyeProtection));
        assert_eq!(
            session.event_for_command("d"),
            Ok(SessionEvent::AmbientModeChanged(AmbientMode::Dark))
        );
        assert!(session.event_for_command("z").is_err());
    }

    #[test]
    fn speed_and_font_steps_are_relative() {
        let session = session();
        assert_eq!(
            session.event_for_command("+"),
            Ok(SessionEvent::UpdateSetting(SettingUpdate::AutoScrollSpeed(3)))
        );
        assert_eq!(
            session.event_for_command("-"),
            Ok(SessionEvent::UpdateSetting(SettingUpdate::AutoScrollSpeed(1)))
        );
        assert_eq!(
            session.event_for_command("]"),
            Ok(SessionEvent::UpdateSetting(SettingUpdate::FontSize(20)))
        );
    }

    #[test]
    fn assignments_become_setting_updates() {
        let session = session();
        assert_eq!(
            session.event_for_command("speechRate=1.5"),
            Ok(SessionEvent::UpdateSetting(SettingUpdate::SpeechRate(1.5)))
        );
        assert!(session.event_for_command("fontSize=huge").is_err());
    }
}
