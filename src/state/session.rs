//! Session store — the in-progress mirror session and the history of finished ones.
//!
//! Lifecycle: `Idle` → `start()` → `Active` → `end()` → `Idle`. Ending a
//! session stamps its end time and duration, prepends it to the history
//! list, persists the whole list, and drops the current-session record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::now_ms;
use crate::error::StorageError;
use crate::store::{KeyValueStore, Record, keys, record};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_voice: Option<bool>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: now_ms(),
            is_voice: None,
        }
    }
}

/// One bounded reflection conversation.
///
/// `end_time` and `duration_ms` are both absent while the session is active
/// and both present once it has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSession {
    pub id: String,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl MirrorSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time: now_ms(),
            end_time: None,
            duration_ms: None,
            messages: Vec::new(),
            insights: None,
            summary: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Stamp end time and duration.
    fn finalize(mut self, now: i64) -> Self {
        let end_time = now.max(self.start_time);
        self.end_time = Some(end_time);
        self.duration_ms = Some(end_time - self.start_time);
        self
    }

    /// Rename fields written before records were versioned.
    fn upgrade_legacy(mut data: Value) -> Result<Value, String> {
        let obj = data
            .as_object_mut()
            .ok_or_else(|| "session is not an object".to_string())?;
        if let Some(duration) = obj.remove("duration") {
            obj.entry("durationMs").or_insert(duration);
        }
        if let Some(insights) = obj.remove("emotionalInsights") {
            obj.entry("insights").or_insert(insights);
        }
        Ok(data)
    }
}

impl Default for MirrorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for MirrorSession {
    const KEY: &'static str = keys::CURRENT_SESSION;
    const VERSION: u32 = 1;

    fn upgrade(version: u32, data: Value) -> Result<Value, String> {
        match version {
            0 => Self::upgrade_legacy(data),
            _ => Ok(data),
        }
    }
}

/// Finished sessions, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct SessionHistory(Vec<MirrorSession>);

impl Record for SessionHistory {
    const KEY: &'static str = keys::SESSIONS;
    const VERSION: u32 = 1;

    fn upgrade(version: u32, data: Value) -> Result<Value, String> {
        match (version, data) {
            (0, Value::Array(items)) => items
                .into_iter()
                .map(MirrorSession::upgrade_legacy)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (0, _) => Err("session history is not a list".to_string()),
            (_, data) => Ok(data),
        }
    }
}

/// Whether a session is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Active,
}

/// Published session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current: Option<MirrorSession>,
    pub history: Vec<MirrorSession>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.current.is_some() {
            SessionPhase::Active
        } else {
            SessionPhase::Idle
        }
    }
}

/// Result of `start()`.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub session: MirrorSession,
    /// A session that was still active and got ended to make room.
    pub archived: Option<MirrorSession>,
}

/// Aggregates over the history list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub last_session_start: Option<i64>,
    pub total_duration_ms: i64,
    pub total_messages: usize,
}

pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    state: Mutex<SessionState>,
    tx: watch::Sender<SessionState>,
}

impl SessionStore {
    /// Create the store from persisted history, restoring a session left
    /// active by a previous run.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let history = match record::load::<SessionHistory>(kv.as_ref()).await {
            Ok(Some(SessionHistory(history))) => history,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Stored session history unreadable, starting empty");
                Vec::new()
            }
        };

        let current = match record::load::<MirrorSession>(kv.as_ref()).await {
            Ok(Some(session)) if !session.is_ended() => {
                info!(session_id = %session.id, "Restored active session");
                Some(session)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Stored current session unreadable, starting idle");
                None
            }
        };

        let initial = SessionState { current, history };
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            kv,
            state: Mutex::new(initial),
            tx,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.tx.borrow().phase()
    }

    pub fn current(&self) -> Option<MirrorSession> {
        self.tx.borrow().current.clone()
    }

    pub fn history(&self) -> Vec<MirrorSession> {
        self.tx.borrow().history.clone()
    }

    /// Look up a finished session by id.
    pub fn find(&self, session_id: &str) -> Option<MirrorSession> {
        self.tx
            .borrow()
            .history
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
    }

    pub fn stats(&self) -> SessionStats {
        let state = self.tx.borrow();
        SessionStats {
            total_sessions: state.history.len(),
            last_session_start: state.history.first().map(|s| s.start_time),
            total_duration_ms: state.history.iter().filter_map(|s| s.duration_ms).sum(),
            total_messages: state.history.iter().map(|s| s.messages.len()).sum(),
        }
    }

    /// Begin a new session. An active session is ended and archived first.
    pub async fn start(&self) -> Result<StartOutcome, StorageError> {
        let mut state = self.state.lock().await;
        let mut first_error = None;

        let archived = match state.current.take() {
            Some(previous) => {
                warn!(session_id = %previous.id, "Session still active on start, archiving it");
                let (ended, result) = self.archive(&mut state, previous).await;
                first_error = result.err();
                Some(ended)
            }
            None => None,
        };

        let session = MirrorSession::new();
        if let Err(e) = record::save(self.kv.as_ref(), &session).await {
            warn!(session_id = %session.id, error = %e, "Failed to persist new session");
            first_error.get_or_insert(e);
        }
        state.current = Some(session.clone());
        self.publish(&state);
        info!(session_id = %session.id, "Session started");

        match first_error {
            Some(e) => Err(e),
            None => Ok(StartOutcome { session, archived }),
        }
    }

    /// Append a message to the active session. Returns `None` when idle.
    pub async fn append_message(
        &self,
        role: Role,
        content: impl Into<String>,
    ) -> Result<Option<Message>, StorageError> {
        let message = Message::new(role, content);
        let appended = self.append(message.clone()).await?;
        Ok(appended.then_some(message))
    }

    /// Append an already-built message. Returns `false` when idle.
    ///
    /// An `Err` means the message is in memory but was not persisted.
    pub async fn append(&self, message: Message) -> Result<bool, StorageError> {
        let (id, role) = (message.id.clone(), message.role);
        let appended = self
            .modify_current(move |session| {
                let mut messages = session.messages.clone();
                messages.push(message);
                MirrorSession {
                    messages,
                    ..session.clone()
                }
            })
            .await?;

        if appended {
            debug!(message_id = %id, role = %role, "Message appended");
        }
        Ok(appended)
    }

    /// Attach insights to the active session. Returns `false` when idle.
    pub async fn set_insights(&self, insights: Vec<String>) -> Result<bool, StorageError> {
        self.modify_current(|session| MirrorSession {
            insights: Some(insights),
            ..session.clone()
        })
        .await
    }

    /// Attach a summary to the active session. Returns `false` when idle.
    pub async fn set_summary(&self, summary: impl Into<String>) -> Result<bool, StorageError> {
        let summary = summary.into();
        self.modify_current(|session| MirrorSession {
            summary: Some(summary),
            ..session.clone()
        })
        .await
    }

    /// End the active session and move it into history. Returns `None` when idle.
    pub async fn end(&self) -> Result<Option<MirrorSession>, StorageError> {
        let mut state = self.state.lock().await;
        let Some(current) = state.current.take() else {
            debug!("end() while idle, ignoring");
            return Ok(None);
        };

        let (ended, result) = self.archive(&mut state, current).await;
        self.publish(&state);
        info!(
            session_id = %ended.id,
            duration_ms = ended.duration_ms.unwrap_or_default(),
            messages = ended.messages.len(),
            "Session ended"
        );
        result.map(|()| Some(ended))
    }

    /// Re-read the persisted history list into memory.
    pub async fn load_history(&self) -> Result<Vec<MirrorSession>, StorageError> {
        let mut state = self.state.lock().await;
        match record::load::<SessionHistory>(self.kv.as_ref()).await {
            Ok(Some(SessionHistory(history))) => {
                state.history = history;
                self.publish(&state);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to load session history");
                return Err(e);
            }
        }
        Ok(state.history.clone())
    }

    /// Delete the persisted history and empty it in memory. The active session is untouched.
    pub async fn clear_history(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let removed = record::delete::<SessionHistory>(self.kv.as_ref()).await;
        state.history.clear();
        self.publish(&state);
        info!("Session history cleared");
        removed.map(|_| ()).inspect_err(|e| {
            warn!(error = %e, "Failed to delete persisted session history");
        })
    }

    /// Replace the active session with `f(session)` and persist it.
    async fn modify_current<F>(&self, f: F) -> Result<bool, StorageError>
    where
        F: FnOnce(&MirrorSession) -> MirrorSession,
    {
        let mut state = self.state.lock().await;
        let Some(current) = state.current.as_ref() else {
            return Ok(false);
        };

        let updated = f(current);
        let persisted = record::save(self.kv.as_ref(), &updated).await;
        state.current = Some(updated);
        self.publish(&state);

        persisted.map(|()| true).inspect_err(|e| {
            warn!(error = %e, "Failed to persist current session");
        })
    }

    /// Finalize `session`, prepend it to history, persist history, drop the current record.
    async fn archive(
        &self,
        state: &mut SessionState,
        session: MirrorSession,
    ) -> (MirrorSession, Result<(), StorageError>) {
        let ended = session.finalize(now_ms());

        let mut history = Vec::with_capacity(state.history.len() + 1);
        history.push(ended.clone());
        history.extend(state.history.iter().cloned());

        let saved = record::save(self.kv.as_ref(), &SessionHistory(history.clone())).await;
        let removed = record::delete::<MirrorSession>(self.kv.as_ref()).await;
        state.history = history;

        let result = saved.and(removed.map(|_| ()));
        if let Err(ref e) = result {
            warn!(session_id = %ended.id, error = %e, "Failed to persist ended session");
        }
        (ended, result)
    }

    fn publish(&self, state: &SessionState) {
        self.tx.send_replace(state.clone());
    }
}
