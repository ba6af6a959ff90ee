//! Onboarding store — first-launch progress.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use super::PersistedCell;
use crate::error::StorageError;
use crate::store::{KeyValueStore, Record, keys};

/// One screen of the first-launch walkthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnboardingStep {
    pub title: &'static str,
    pub description: &'static str,
}

pub static ONBOARDING_STEPS: [OnboardingStep; 4] = [
    OnboardingStep {
        title: "Welcome to MirrorMe",
        description: "Your AI-powered companion for self-reflection and personal growth. \
                      Discover deeper insights about yourself.",
    },
    OnboardingStep {
        title: "Mirror Session",
        description: "Face yourself through your camera and engage in meaningful AI-guided \
                      reflection. Voice or text - your choice.",
    },
    OnboardingStep {
        title: "AI Chat",
        description: "Have thoughtful conversations anytime. Your AI coach is here to listen, \
                      understand, and support your journey.",
    },
    OnboardingStep {
        title: "Privacy First",
        description: "Your conversations stay on your device. We respect your privacy and \
                      keep your reflections secure.",
    },
];

/// Persisted onboarding progress.
///
/// Once `completed` is set, routing no longer looks at `current_step`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingProgress {
    pub completed: bool,
    pub current_step: u32,
    pub skipped: bool,
}

impl OnboardingProgress {
    /// The step currently shown, if onboarding is still running.
    pub fn step(&self) -> Option<&'static OnboardingStep> {
        if self.completed {
            return None;
        }
        ONBOARDING_STEPS.get(self.current_step as usize)
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step as usize + 1 >= ONBOARDING_STEPS.len()
    }
}

impl Record for OnboardingProgress {
    const KEY: &'static str = keys::ONBOARDING;
    const VERSION: u32 = 1;
}

pub struct OnboardingStore {
    cell: PersistedCell<OnboardingProgress>,
}

impl OnboardingStore {
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cell: PersistedCell::load(kv, OnboardingProgress::default()).await,
        }
    }

    pub fn get(&self) -> OnboardingProgress {
        self.cell.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<OnboardingProgress> {
        self.cell.subscribe()
    }

    pub fn is_complete(&self) -> bool {
        self.get().completed
    }

    /// Set the current step index.
    pub async fn advance_step(&self, step: u32) -> Result<OnboardingProgress, StorageError> {
        self.cell
            .update(|current| OnboardingProgress {
                current_step: step,
                ..current.clone()
            })
            .await
    }

    /// Move to the following step, completing onboarding after the last one.
    /// A completed record is left as it is.
    pub async fn next_step(&self) -> Result<OnboardingProgress, StorageError> {
        self.cell
            .update(|current| {
                if current.completed {
                    current.clone()
                } else if current.is_last_step() {
                    info!("Onboarding completed");
                    OnboardingProgress {
                        completed: true,
                        current_step: 0,
                        skipped: false,
                    }
                } else {
                    OnboardingProgress {
                        current_step: current.current_step + 1,
                        ..current.clone()
                    }
                }
            })
            .await
    }

    pub async fn complete(&self) -> Result<OnboardingProgress, StorageError> {
        info!("Onboarding completed");
        self.cell
            .update(|_| OnboardingProgress {
                completed: true,
                current_step: 0,
                skipped: false,
            })
            .await
    }

    pub async fn skip(&self) -> Result<OnboardingProgress, StorageError> {
        info!("Onboarding skipped");
        self.cell
            .update(|_| OnboardingProgress {
                completed: true,
                current_step: 0,
                skipped: true,
            })
            .await
    }

    pub async fn reset(&self) -> Result<OnboardingProgress, StorageError> {
        info!("Onboarding reset");
        self.cell.update(|_| OnboardingProgress::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, record};

    #[tokio::test]
    async fn fresh_install_starts_at_step_zero() {
        let store = OnboardingStore::load(Arc::new(MemoryStore::new())).await;
        let progress = store.get();
        assert_eq!(progress, OnboardingProgress::default());
        assert_eq!(progress.step().unwrap().title, "Welcome to MirrorMe");
        assert!(!store.is_complete());
    }

    #[tokio::test]
    async fn next_step_walks_all_steps_then_completes() {
        let store = OnboardingStore::load(Arc::new(MemoryStore::new())).await;

        for expected in 1..ONBOARDING_STEPS.len() as u32 {
            let progress = store.next_step().await.unwrap();
            assert_eq!(progress.current_step, expected);
            assert!(!progress.completed);
        }

        let done = store.next_step().await.unwrap();
        assert!(done.completed);
        assert!(!done.skipped);
        assert_eq!(done.current_step, 0);
        assert!(done.step().is_none());
    }

    #[tokio::test]
    async fn next_step_after_completion_changes_nothing() {
        let store = OnboardingStore::load(Arc::new(MemoryStore::new())).await;
        let skipped = store.skip().await.unwrap();

        let again = store.next_step().await.unwrap();
        assert_eq!(again, skipped);
        assert_eq!(again.current_step, 0);
        assert!(again.skipped);
    }

    #[tokio::test]
    async fn skip_marks_completed_and_skipped() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = OnboardingStore::load(kv.clone()).await;
        store.advance_step(2).await.unwrap();

        let skipped = store.skip().await.unwrap();
        assert!(skipped.completed);
        assert!(skipped.skipped);
        assert_eq!(skipped.current_step, 0);

        let stored = record::load::<OnboardingProgress>(kv.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, skipped);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let store = OnboardingStore::load(Arc::new(MemoryStore::new())).await;
        store.complete().await.unwrap();

        let once = store.reset().await.unwrap();
        let twice = store.reset().await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, OnboardingProgress::default());
    }

    #[tokio::test]
    async fn progress_survives_reload() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        OnboardingStore::load(kv.clone())
            .await
            .advance_step(3)
            .await
            .unwrap();

        let reloaded = OnboardingStore::load(kv).await;
        assert_eq!(reloaded.get().current_step, 3);
        assert!(reloaded.get().is_last_step());
    }

    #[test]
    fn progress_serde_uses_camel_case() {
        let json = serde_json::to_value(OnboardingProgress {
            completed: true,
            current_step: 2,
            skipped: false,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"completed": true, "currentStep": 2, "skipped": false})
        );
    }
}
