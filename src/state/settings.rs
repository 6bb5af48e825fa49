//! User settings persisted under `timerSettings`

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::services::storage::{load_json, save_json, KeyValueStore};

pub const SETTINGS_KEY: &str = "timerSettings";

/// Alert and display preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    /// Quick-pick durations in seconds, ascending
    pub presets: Vec<u64>,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub dark_mode: bool,
    pub selected_sound: String,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            presets: vec![60, 180, 300, 600, 1500],
            sound_enabled: true,
            vibration_enabled: true,
            dark_mode: false,
            selected_sound: "default".to_string(),
        }
    }
}

/// Shared settings provider read by the notifier and the alert player
pub struct SettingsStore {
    settings: RwLock<TimerSettings>,
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    /// Restore settings; missing fields take defaults, corruption resets everything
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let settings = match load_json::<TimerSettings>(store.as_ref(), SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => TimerSettings::default(),
            Err(e) => {
                error!("Failed to load settings: {}", e);
                TimerSettings::default()
            }
        };

        Self {
            settings: RwLock::new(settings),
            store,
        }
    }

    /// Current settings
    pub fn get(&self) -> TimerSettings {
        self.read().clone()
    }

    pub fn sound_enabled(&self) -> bool {
        self.read().sound_enabled
    }

    pub fn vibration_enabled(&self) -> bool {
        self.read().vibration_enabled
    }

    pub fn save(&self) {
        let settings = self.get();
        if let Err(e) = save_json(self.store.as_ref(), SETTINGS_KEY, &settings) {
            error!("Failed to save settings: {}", e);
        }
    }

    pub fn toggle_sound(&self) -> bool {
        self.update(|s| {
            s.sound_enabled = !s.sound_enabled;
            s.sound_enabled
        })
    }

    pub fn toggle_vibration(&self) -> bool {
        self.update(|s| {
            s.vibration_enabled = !s.vibration_enabled;
            s.vibration_enabled
        })
    }

    pub fn toggle_dark_mode(&self) -> bool {
        self.update(|s| {
            s.dark_mode = !s.dark_mode;
            s.dark_mode
        })
    }

    pub fn set_selected_sound(&self, sound: &str) {
        info!("Selected sound changed to: {}", sound);
        self.update(|s| s.selected_sound = sound.to_string());
    }

    /// Add a preset, keeping the list sorted and free of duplicates
    pub fn add_preset(&self, seconds: u64) -> bool {
        if self.read().presets.contains(&seconds) {
            return false;
        }
        self.update(|s| {
            s.presets.push(seconds);
            s.presets.sort_unstable();
        });
        true
    }

    pub fn remove_preset(&self, seconds: u64) -> bool {
        if !self.read().presets.contains(&seconds) {
            return false;
        }
        self.update(|s| s.presets.retain(|&p| p != seconds));
        true
    }

    fn update<R>(&self, updater: impl FnOnce(&mut TimerSettings) -> R) -> R {
        let result = {
            let mut settings = self.write();
            updater(&mut settings)
        };
        self.save();
        result
    }

    fn read(&self) -> RwLockReadGuard<'_, TimerSettings> {
        self.settings.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TimerSettings> {
        self.settings.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryStore;

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_defaults_when_nothing_saved() {
        let settings = SettingsStore::load(store());
        assert_eq!(settings.get(), TimerSettings::default());
        assert!(settings.sound_enabled());
        assert!(settings.vibration_enabled());
    }

    #[test]
    fn test_partial_json_merges_over_defaults() {
        let kv = store();
        kv.set(SETTINGS_KEY, r#"{"soundEnabled":false,"darkMode":true}"#)
            .unwrap();

        let settings = SettingsStore::load(kv).get();
        assert!(!settings.sound_enabled);
        assert!(settings.dark_mode);
        assert!(settings.vibration_enabled);
        assert_eq!(settings.presets, vec![60, 180, 300, 600, 1500]);
    }

    #[test]
    fn test_corrupt_json_falls_back_to_defaults() {
        let kv = store();
        kv.set(SETTINGS_KEY, "{{{{").unwrap();
        assert_eq!(SettingsStore::load(kv).get(), TimerSettings::default());
    }

    #[test]
    fn test_toggles_persist() {
        let kv = store();
        let settings = SettingsStore::load(Arc::clone(&kv));
        assert!(!settings.toggle_sound());
        assert!(!settings.toggle_vibration());
        assert!(settings.toggle_dark_mode());

        let reloaded = SettingsStore::load(kv).get();
        assert!(!reloaded.sound_enabled);
        assert!(!reloaded.vibration_enabled);
        assert!(reloaded.dark_mode);
    }

    #[test]
    fn test_presets_sorted_and_unique() {
        let settings = SettingsStore::load(store());
        assert!(settings.add_preset(90));
        assert!(!settings.add_preset(90));
        assert_eq!(settings.get().presets, vec![60, 90, 180, 300, 600, 1500]);

        assert!(settings.remove_preset(180));
        assert!(!settings.remove_preset(42));
        assert_eq!(settings.get().presets, vec![60, 90, 300, 600, 1500]);
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(TimerSettings::default()).unwrap();
        assert_eq!(json["soundEnabled"], true);
        assert_eq!(json["selectedSound"], "default");
        assert!(json.get("sound_enabled").is_none());
    }
}
