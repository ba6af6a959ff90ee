//! Settings store — user preference flags.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::info;

use super::PersistedCell;
use super::theme::Theme;
use crate::error::StorageError;
use crate::store::{KeyValueStore, Record, keys};

/// The full preference record. Always persisted whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub theme: Theme,
    /// Whether assistant replies are spoken aloud.
    #[serde(rename = "aiVoiceEnabled")]
    pub voice_enabled: bool,
    #[serde(rename = "hapticEnabled")]
    pub haptic_enabled: bool,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            voice_enabled: true,
            haptic_enabled: true,
            language: "en".to_string(),
        }
    }
}

impl Record for UserSettings {
    const KEY: &'static str = keys::SETTINGS;
    const VERSION: u32 = 1;

    fn upgrade(version: u32, data: Value) -> Result<Value, String> {
        match version {
            // Unversioned records may be partial; fill gaps from defaults.
            0 => {
                let mut merged = serde_json::to_value(UserSettings::default())
                    .map_err(|e| e.to_string())?;
                let (Some(target), Value::Object(source)) = (merged.as_object_mut(), data) else {
                    return Err("settings record is not an object".to_string());
                };
                for (key, value) in source {
                    if target.contains_key(&key) {
                        target.insert(key, value);
                    }
                }
                Ok(merged)
            }
            _ => Ok(data),
        }
    }
}

/// A partial update merged into the current record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub voice_enabled: Option<bool>,
    pub haptic_enabled: Option<bool>,
    pub language: Option<String>,
}

impl SettingsPatch {
    pub fn apply(&self, base: &UserSettings) -> UserSettings {
        UserSettings {
            theme: self.theme.unwrap_or(base.theme),
            voice_enabled: self.voice_enabled.unwrap_or(base.voice_enabled),
            haptic_enabled: self.haptic_enabled.unwrap_or(base.haptic_enabled),
            language: self
                .language
                .clone()
                .unwrap_or_else(|| base.language.clone()),
        }
    }
}

pub struct SettingsStore {
    cell: PersistedCell<UserSettings>,
}

impl SettingsStore {
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cell: PersistedCell::load(kv, UserSettings::default()).await,
        }
    }

    pub fn get(&self) -> UserSettings {
        self.cell.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<UserSettings> {
        self.cell.subscribe()
    }

    /// Merge `patch` into the current record and persist the result.
    pub async fn update(&self, patch: SettingsPatch) -> Result<UserSettings, StorageError> {
        self.cell.update(|current| patch.apply(current)).await
    }

    /// Restore defaults.
    pub async fn reset(&self) -> Result<UserSettings, StorageError> {
        info!("Settings reset to defaults");
        self.cell.update(|_| UserSettings::default()).await
    }

    pub async fn toggle_voice(&self) -> Result<UserSettings, StorageError> {
        self.cell
            .update(|current| UserSettings {
                voice_enabled: !current.voice_enabled,
                ..current.clone()
            })
            .await
    }

    pub async fn toggle_haptic(&self) -> Result<UserSettings, StorageError> {
        self.cell
            .update(|current| UserSettings {
                haptic_enabled: !current.haptic_enabled,
                ..current.clone()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::RecordingStore;
    use crate::store::{MemoryStore, record};

    async fn persisted(kv: &dyn KeyValueStore) -> Value {
        record::get_json::<Value>(kv, keys::SETTINGS)
            .await
            .unwrap()
            .unwrap()
    }

    fn assert_schema_complete(envelope: &Value) {
        let data = envelope["data"].as_object().expect("data object");
        for field in ["theme", "aiVoiceEnabled", "hapticEnabled", "language"] {
            assert!(data.contains_key(field), "missing {field} in {envelope}");
        }
        assert_eq!(data.len(), 4);
    }

    #[tokio::test]
    async fn toggle_haptic_flips_and_persists() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = SettingsStore::load(kv.clone()).await;
        assert!(store.get().haptic_enabled);

        let updated = store.toggle_haptic().await.unwrap();
        assert!(!updated.haptic_enabled);
        assert_eq!(persisted(kv.as_ref()).await["data"]["hapticEnabled"], false);

        let restored = store.toggle_haptic().await.unwrap();
        assert!(restored.haptic_enabled);
        assert_eq!(persisted(kv.as_ref()).await["data"]["hapticEnabled"], true);
    }

    #[tokio::test]
    async fn every_mutation_writes_one_complete_record() {
        let kv = Arc::new(RecordingStore::default());
        let store = SettingsStore::load(kv.clone()).await;

        store.toggle_voice().await.unwrap();
        assert_schema_complete(&persisted(kv.as_ref()).await);
        store
            .update(SettingsPatch {
                language: Some("fr".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_schema_complete(&persisted(kv.as_ref()).await);
        store.toggle_haptic().await.unwrap();
        assert_schema_complete(&persisted(kv.as_ref()).await);
        store.reset().await.unwrap();
        assert_schema_complete(&persisted(kv.as_ref()).await);

        assert_eq!(kv.writes(), 4);
    }

    #[tokio::test]
    async fn update_merges_only_given_fields() {
        let store = SettingsStore::load(Arc::new(MemoryStore::new())).await;
        let updated = store
            .update(SettingsPatch {
                theme: Some(Theme::Light),
                language: Some("es".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.theme, Theme::Light);
        assert_eq!(updated.language, "es");
        assert!(updated.voice_enabled);
        assert!(updated.haptic_enabled);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let store = SettingsStore::load(Arc::new(MemoryStore::new())).await;
        store.toggle_voice().await.unwrap();

        let once = store.reset().await.unwrap();
        let twice = store.reset().await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, UserSettings::default());
    }

    #[tokio::test]
    async fn persist_failure_still_updates_memory() {
        let kv = Arc::new(RecordingStore::default());
        let store = SettingsStore::load(kv.clone()).await;
        let mut rx = store.subscribe();

        kv.set_failing(true);
        let err = store.toggle_voice().await.unwrap_err();
        assert!(matches!(err, StorageError::Query(_)));
        assert!(!store.get().voice_enabled);
        assert!(!rx.borrow_and_update().voice_enabled);
    }

    #[tokio::test]
    async fn partial_legacy_record_is_completed_on_load() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        kv.set_raw(keys::SETTINGS, r#"{"theme":"light","hapticEnabled":false}"#)
            .await
            .unwrap();

        let store = SettingsStore::load(kv).await;
        let settings = store.get();
        assert_eq!(settings.theme, Theme::Light);
        assert!(!settings.haptic_enabled);
        assert!(settings.voice_enabled);
        assert_eq!(settings.language, "en");
    }

    #[tokio::test]
    async fn unreadable_record_falls_back_to_defaults() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        kv.set_raw(keys::SETTINGS, "garbage").await.unwrap();
        let store = SettingsStore::load(kv).await;
        assert_eq!(store.get(), UserSettings::default());
    }

    #[test]
    fn settings_serde_uses_stored_field_names() {
        let json = serde_json::to_value(UserSettings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "theme": "dark",
                "aiVoiceEnabled": true,
                "hapticEnabled": true,
                "language": "en"
            })
        );
    }
}
