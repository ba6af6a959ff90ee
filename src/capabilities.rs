//! Device capability seams: speech output, haptic feedback, permissions.
//!
//! The app only ever talks to these traits. The bundled implementations log
//! through `tracing`, which is what the CLI and tests use.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

/// Text-to-speech output.
#[async_trait]
pub trait Speech: Send + Sync {
    async fn speak(&self, text: &str);
    async fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticKind {
    Light,
    Medium,
    Heavy,
    Success,
    Warning,
    Error,
    Selection,
}

impl std::fmt::Display for HapticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Selection => "selection",
        };
        write!(f, "{s}")
    }
}

/// Haptic feedback.
#[async_trait]
pub trait Haptics: Send + Sync {
    async fn trigger(&self, kind: HapticKind);
}

/// Outcome of a permission check or request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatus {
    pub granted: bool,
    /// User-facing explanation when not granted.
    pub message: Option<String>,
}

impl PermissionStatus {
    pub fn granted() -> Self {
        Self {
            granted: true,
            message: None,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            granted: false,
            message: Some(message.into()),
        }
    }
}

/// Camera permission source.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Current state without prompting.
    async fn check(&self) -> Result<bool, String>;
    /// Prompt for access.
    async fn request(&self) -> Result<bool, String>;
}

pub const CAMERA_DENIED_MESSAGE: &str =
    "Camera and headset camera permissions are required to use this feature.";
pub const CAMERA_REQUEST_FAILED_MESSAGE: &str = "Failed to request permissions";

/// Camera access guard for mirror sessions.
pub struct CameraAccess {
    gate: Arc<dyn PermissionGate>,
}

impl CameraAccess {
    pub fn new(gate: Arc<dyn PermissionGate>) -> Self {
        Self { gate }
    }

    /// Check access, requesting it when missing.
    pub async fn ensure(&self) -> PermissionStatus {
        match self.gate.check().await {
            Ok(true) => return PermissionStatus::granted(),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Permission check failed, requesting"),
        }

        match self.gate.request().await {
            Ok(true) => {
                info!("Camera permission granted");
                PermissionStatus::granted()
            }
            Ok(false) => PermissionStatus::denied(CAMERA_DENIED_MESSAGE),
            Err(e) => {
                warn!(error = %e, "Permission request failed");
                PermissionStatus::denied(CAMERA_REQUEST_FAILED_MESSAGE)
            }
        }
    }

    pub async fn retry(&self) -> PermissionStatus {
        self.ensure().await
    }
}

/// Speech that writes to the log instead of a speaker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeech;

#[async_trait]
impl Speech for LogSpeech {
    async fn speak(&self, text: &str) {
        info!(chars = text.len(), "speak: {text}");
    }

    async fn stop(&self) {
        info!("speech stopped");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogHaptics;

#[async_trait]
impl Haptics for LogHaptics {
    async fn trigger(&self, kind: HapticKind) {
        tracing::debug!(kind = %kind, "haptic");
    }
}

/// Permission gate for hosts without a camera prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn check(&self) -> Result<bool, String> {
        Ok(true)
    }

    async fn request(&self) -> Result<bool, String> {
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Records every speech and haptic call.
    #[derive(Default)]
    pub struct Recorder {
        pub spoken: Mutex<Vec<String>>,
        pub stops: Mutex<usize>,
        pub haptics: Mutex<Vec<HapticKind>>,
    }

    #[async_trait]
    impl Speech for Recorder {
        async fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }

        async fn stop(&self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    #[async_trait]
    impl Haptics for Recorder {
        async fn trigger(&self, kind: HapticKind) {
            self.haptics.lock().unwrap().push(kind);
        }
    }
}
