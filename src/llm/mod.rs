//! LLM integration for MirrorMe.
//!
//! Talks to any OpenAI-compatible chat-completion API through `reqwest`.
//! Without an API key the offline provider is used and every request
//! fails, so callers fall back to canned replies.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;

use crate::config::CoachConfig;
use crate::error::LlmError;

/// Create an LLM provider from configuration.
pub fn create_provider(config: &CoachConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match &config.api_key {
        Some(key) => {
            let provider = OpenAiProvider::new(key.clone(), &config.api_base, &config.model)?;
            tracing::info!("Using OpenAI-compatible API (model: {})", config.model);
            Ok(Arc::new(provider))
        }
        None => {
            tracing::warn!("No API key configured, coach replies will use fallbacks");
            Ok(Arc::new(OfflineProvider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_with_key() {
        let config = CoachConfig {
            api_key: Some(secrecy::SecretString::from("sk-test")),
            model: "gpt-4o".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o");
    }

    #[test]
    fn create_provider_without_key_is_offline() {
        let provider = create_provider(&CoachConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "offline");
    }
}
