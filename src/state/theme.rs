//! Theme store — the active color scheme.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use super::PersistedCell;
use crate::error::StorageError;
use crate::store::{KeyValueStore, Record, keys};

/// Color scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme '{other}' (expected light or dark)")),
        }
    }
}

impl Record for Theme {
    const KEY: &'static str = keys::THEME;
    const VERSION: u32 = 1;
}

pub struct ThemeStore {
    cell: PersistedCell<Theme>,
}

impl ThemeStore {
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cell: PersistedCell::load(kv, Theme::default()).await,
        }
    }

    pub fn get(&self) -> Theme {
        self.cell.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.cell.subscribe()
    }

    /// Flip light and dark.
    pub async fn toggle(&self) -> Result<Theme, StorageError> {
        let theme = self.cell.update(|t| t.toggled()).await;
        info!(theme = %self.get(), "Theme toggled");
        theme
    }

    pub async fn set(&self, theme: Theme) -> Result<Theme, StorageError> {
        info!(theme = %theme, "Theme set");
        self.cell.update(|_| theme).await
    }
}
