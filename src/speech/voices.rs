use serde::Serialize;
use ts_rs::TS;

/// A voice offered by the platform speech service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Voice {
    pub name: String,
    pub language_tag: String,
    pub is_default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, language_tag: impl Into<String>, is_default: bool) -> Self {
        Self {
            name: name.into(),
            language_tag: language_tag.into(),
            is_default,
        }
    }

    /// True when any subtag of the language tag names one of `languages`.
    /// `zh-CN`, `zh_TW` and `cmn-Hans-CN` all match `["zh", "cmn"]`.
    pub fn speaks_any(&self, languages: &[String]) -> bool {
        self.language_tag
            .split(['-', '_'])
            .any(|subtag| languages.iter().any(|lang| subtag.eq_ignore_ascii_case(lang)))
    }
}

/// Pick the narration voice.
///
/// A configured name wins when the platform has it. Otherwise the first
/// voice in a preferred language, then the platform default, then whatever
/// comes first.
pub fn select_voice<'a>(
    voices: &'a [Voice],
    configured: Option<&str>,
    languages: &[String],
) -> Option<&'a Voice> {
    if let Some(name) = configured {
        if let Some(voice) = voices.iter().find(|voice| voice.name == name) {
            return Some(voice);
        }
        tracing::debug!(voice = name, "Configured voice not offered; falling back");
    }
    voices
        .iter()
        .find(|voice| voice.speaks_any(languages))
        .or_else(|| voices.iter().find(|voice| voice.is_default))
        .or_else(|| voices.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn languages() -> Vec<String> {
        vec!["zh".to_string(), "cmn".to_string()]
    }

    fn catalog() -> Vec<Voice> {
        vec![
            Voice::new("Daniel", "en-GB", true),
            Voice::new("Ting-Ting", "zh-CN", false),
            Voice::new("Mei-Jia", "zh_TW", false),
        ]
    }

    #[test]
    fn configured_voice_is_honoured() {
        let voices = catalog();
        let picked = select_voice(&voices, Some("Mei-Jia"), &languages());
        assert_eq!(picked.map(|v| v.name.as_str()), Some("Mei-Jia"));
    }

    #[test]
    fn unknown_configured_voice_falls_back_to_language() {
        let voices = catalog();
        let picked = select_voice(&voices, Some("Missing"), &languages());
        assert_eq!(picked.map(|v| v.name.as_str()), Some("Ting-Ting"));
    }

    #[test]
    fn without_language_match_prefers_default_then_first() {
        let voices = vec![Voice::new("Alex", "en-US", false), Voice::new("Daniel", "en-GB", true)];
        let picked = select_voice(&voices, None, &languages());
        assert_eq!(picked.map(|v| v.name.as_str()), Some("Daniel"));

        let voices = vec![Voice::new("Alex", "en-US", false)];
        assert_eq!(select_voice(&voices, None, &languages()), voices.first());
        assert_eq!(select_voice(&[], None, &languages()), None);
    }

    #[test]
    fn language_match_uses_subtags() {
        assert!(Voice::new("x", "cmn-Hans-CN", false).speaks_any(&languages()));
        assert!(!Voice::new("x", "zu-ZA", false).speaks_any(&languages()));
    }
}
