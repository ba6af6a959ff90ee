//! Application context: the persistence adapter, the four stores, and the
//! collaborators, built once at startup and shared by reference.

use std::sync::Arc;

use crate::capabilities::{AlwaysGranted, CameraAccess, Haptics, LogHaptics, LogSpeech, Speech};
use crate::coach::Coach;
use crate::config::AppConfig;
use crate::conversation::{ChatFlow, MirrorSessionFlow};
use crate::error::Result;
use crate::llm::create_provider;
use crate::state::{OnboardingStore, SessionStore, SettingsStore, ThemeStore};
use crate::store::{KeyValueStore, LibSqlStore, MemoryStore};

/// First screen to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Onboarding,
    Home,
}

pub struct AppContext {
    pub kv: Arc<dyn KeyValueStore>,
    pub settings: Arc<SettingsStore>,
    pub onboarding: Arc<OnboardingStore>,
    pub sessions: Arc<SessionStore>,
    pub theme: Arc<ThemeStore>,
    pub coach: Arc<Coach>,
    pub speech: Arc<dyn Speech>,
    pub haptics: Arc<dyn Haptics>,
    pub camera: CameraAccess,
}

impl AppContext {
    /// Open the on-disk store at `config.db_path` and load every record.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(LibSqlStore::open(&config.db_path).await?);
        Self::with_store(kv, config).await
    }

    /// Same as [`AppContext::open`] but nothing outlives the process.
    pub async fn ephemeral(config: &AppConfig) -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        Self::with_store(kv, config).await
    }

    async fn with_store(kv: Arc<dyn KeyValueStore>, config: &AppConfig) -> Result<Self> {
        let llm = create_provider(&config.coach)?;
        let coach = Arc::new(Coach::new(llm, config.coach.max_history_turns));
        Ok(Self::load(kv, coach, Arc::new(LogSpeech), Arc::new(LogHaptics)).await)
    }

    /// Load all stores from `kv`. Unreadable records fall back to defaults.
    /// Camera access starts out granted; see [`AppContext::with_camera`].
    pub async fn load(
        kv: Arc<dyn KeyValueStore>,
        coach: Arc<Coach>,
        speech: Arc<dyn Speech>,
        haptics: Arc<dyn Haptics>,
    ) -> Self {
        let settings = Arc::new(SettingsStore::load(kv.clone()).await);
        let onboarding = Arc::new(OnboardingStore::load(kv.clone()).await);
        let theme = Arc::new(ThemeStore::load(kv.clone()).await);
        let sessions = Arc::new(SessionStore::load(kv.clone()).await);

        Self {
            kv,
            settings,
            onboarding,
            sessions,
            theme,
            coach,
            speech,
            haptics,
            camera: CameraAccess::new(Arc::new(AlwaysGranted)),
        }
    }

    /// Replace the camera permission guard.
    pub fn with_camera(mut self, camera: CameraAccess) -> Self {
        self.camera = camera;
        self
    }

    pub fn initial_route(&self) -> Route {
        if self.onboarding.is_complete() {
            Route::Home
        } else {
            Route::Onboarding
        }
    }

    pub fn mirror_flow(&self) -> MirrorSessionFlow {
        MirrorSessionFlow::new(
            self.sessions.clone(),
            self.settings.clone(),
            self.coach.clone(),
            self.speech.clone(),
            self.haptics.clone(),
        )
    }

    pub fn chat_flow(&self) -> ChatFlow {
        ChatFlow::new(self.coach.clone())
    }
}
