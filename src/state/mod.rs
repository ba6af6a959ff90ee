//! State stores — in-memory holders of one persisted record each.
//!
//! A store computes the next value, persists it through the
//! [`KeyValueStore`], then commits it in memory and publishes it to
//! subscribers. Publication happens even when persisting fails; the
//! failure is logged and returned to the caller.

pub mod onboarding;
pub mod session;
pub mod settings;
pub mod theme;

pub use onboarding::{ONBOARDING_STEPS, OnboardingProgress, OnboardingStep, OnboardingStore};
pub use session::{
    Message, MirrorSession, Role, SessionPhase, SessionState, SessionStats, SessionStore,
    StartOutcome,
};
pub use settings::{SettingsPatch, SettingsStore, UserSettings};
pub use theme::{Theme, ThemeStore};

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::warn;

use crate::error::StorageError;
use crate::store::{KeyValueStore, Record, record};

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One persisted record plus its subscribers.
pub(crate) struct PersistedCell<R> {
    kv: Arc<dyn KeyValueStore>,
    current: Mutex<R>,
    tx: watch::Sender<R>,
}

impl<R> PersistedCell<R>
where
    R: Record + Clone,
{
    /// Load the record, falling back to `default` when it is absent or unreadable.
    pub(crate) async fn load(kv: Arc<dyn KeyValueStore>, default: R) -> Self {
        let initial = match record::load::<R>(kv.as_ref()).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key = R::KEY, error = %e, "Stored record unreadable, using defaults");
                default
            }
        };
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            kv,
            current: Mutex::new(initial),
            tx,
        }
    }

    pub(crate) fn get(&self) -> R {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<R> {
        self.tx.subscribe()
    }

    /// Replace the record with `f(current)`, persist it whole, and publish.
    pub(crate) async fn update<F>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&R) -> R,
    {
        let mut current = self.current.lock().await;
        let next = f(&*current);
        let persisted = record::save(self.kv.as_ref(), &next).await;

        *current = next.clone();
        self.tx.send_replace(next.clone());

        match persisted {
            Ok(()) => Ok(next),
            Err(e) => {
                warn!(key = R::KEY, error = %e, "Failed to persist record");
                Err(e)
            }
        }
    }
}
