//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Environment variable names.
pub mod env_keys {
    pub const DB_PATH: &str = "MIRRORME_DB_PATH";
    pub const API_KEY: &str = "OPENAI_API_KEY";
    pub const MODEL: &str = "MIRRORME_MODEL";
    pub const API_BASE: &str = "MIRRORME_API_BASE";
    pub const HISTORY_TURNS: &str = "MIRRORME_HISTORY_TURNS";
}

pub const APP_NAME: &str = "MirrorMe";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the local libSQL database holding persisted records.
    pub db_path: PathBuf,
    /// Chat-completion settings.
    pub coach: CoachConfig,
}

/// Settings for the chat-completion collaborator.
#[derive(Debug, Clone)]
pub struct CoachConfig {
    /// API key. `None` means the coach runs offline and always falls back.
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Base URL of an OpenAI-compatible API, without trailing slash.
    pub api_base: String,
    /// Maximum number of prior messages sent along with a request.
    pub max_history_turns: usize,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            max_history_turns: 20,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/mirror-me.db"),
            coach: CoachConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(env_keys::DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        config.coach.api_key = lookup(env_keys::API_KEY)
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        if let Some(model) = lookup(env_keys::MODEL).filter(|m| !m.trim().is_empty()) {
            config.coach.model = model;
        }

        if let Some(base) = lookup(env_keys::API_BASE).filter(|b| !b.trim().is_empty()) {
            config.coach.api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup(env_keys::HISTORY_TURNS) {
            config.coach.max_history_turns =
                raw.trim()
                    .parse()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: env_keys::HISTORY_TURNS.to_string(),
                        message: format!("{raw:?} is not a number: {e}"),
                    })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("./data/mirror-me.db"));
        assert!(config.coach.api_key.is_none());
        assert_eq!(config.coach.model, "gpt-4o-mini");
        assert_eq!(config.coach.max_history_turns, 20);
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (env_keys::DB_PATH, "/tmp/mm.db"),
            (env_keys::API_KEY, "sk-test"),
            (env_keys::MODEL, "gpt-4o"),
            (env_keys::API_BASE, "http://localhost:8080/v1/"),
            (env_keys::HISTORY_TURNS, "6"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/mm.db"));
        assert_eq!(config.coach.api_key.unwrap().expose_secret(), "sk-test");
        assert_eq!(config.coach.model, "gpt-4o");
        assert_eq!(config.coach.api_base, "http://localhost:8080/v1");
        assert_eq!(config.coach.max_history_turns, 6);
    }

    #[test]
    fn blank_api_key_means_offline() {
        let config = AppConfig::from_lookup(lookup_from(&[(env_keys::API_KEY, "  ")])).unwrap();
        assert!(config.coach.api_key.is_none());
    }

    #[test]
    fn invalid_history_turns_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[(env_keys::HISTORY_TURNS, "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == env_keys::HISTORY_TURNS));
    }
}
