use super::{AmbientMode, ReaderSettings, SettingUpdate, SettingsEvent, reconcile};
use crate::store::{KeyValueStore, PreferenceStore};
use tracing::{debug, info, warn};

/// Owns the live settings record and writes it through after every mutation.
pub struct SettingsReconciler<S> {
    store: PreferenceStore<S>,
    key: String,
    current: ReaderSettings,
}

impl<S: KeyValueStore> SettingsReconciler<S> {
    /// Read the stored record, or start from defaults. Never fails.
    pub fn load(store: PreferenceStore<S>, key: impl Into<String>) -> Self {
        let key = key.into();
        let current = match store.load::<ReaderSettings>(&key) {
            Some(stored) => {
                info!(key = %key, "Loaded reader settings from store");
                stored.clamped()
            }
            None => {
                info!(key = %key, "Using default reader settings");
                ReaderSettings::default()
            }
        };
        Self {
            store,
            key,
            current,
        }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.current
    }

    pub fn apply(&mut self, event: SettingsEvent) -> &ReaderSettings {
        let next = reconcile(&self.current, &event);
        if matches!(event, SettingsEvent::AmbientModeChanged(_)) && next == self.current {
            debug!("No settings change to persist");
            return &self.current;
        }
        self.current = next;
        self.persist();
        &self.current
    }

    /// Merged over the stored object so keys this build does not know
    /// about survive. A failed write keeps the in-memory record.
    fn persist(&mut self) {
        match serde_json::to_value(&self.current) {
            Ok(record) => {
                self.store.merge(&self.key, record);
            }
            Err(err) => warn!(key = %self.key, "Failed to encode reader settings: {err}"),
        }
    }

    pub fn update(&mut self, update: SettingUpdate) -> &ReaderSettings {
        self.apply(SettingsEvent::Update(update))
    }

    pub fn toggle_eye_protection(&mut self) -> &ReaderSettings {
        self.apply(SettingsEvent::ToggleEyeProtection)
    }

    pub fn toggle_auto_scroll(&mut self) -> &ReaderSettings {
        self.apply(SettingsEvent::ToggleAutoScroll)
    }

    pub fn reset(&mut self) -> &ReaderSettings {
        self.apply(SettingsEvent::Reset)
    }

    pub fn ambient_mode_changed(&mut self, mode: AmbientMode) -> &ReaderSettings {
        self.apply(SettingsEvent::AmbientModeChanged(mode))
    }

    #[cfg(test)]
    pub fn store(&self) -> &PreferenceStore<S> {
        &self.store
    }
}
