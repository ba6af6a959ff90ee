//! Conversation flows that tie the coach to the stores and device capabilities.

use std::sync::Arc;

use tracing::{debug, info};

use crate::capabilities::{HapticKind, Haptics, Speech};
use crate::coach::{Coach, CoachReply, prompts};
use crate::error::StorageError;
use crate::state::{Message, MirrorSession, Role, SessionPhase, SessionStore, SettingsStore};

/// One user turn and the coach's answer, as recorded in the session.
#[derive(Debug)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Message,
    pub reply: CoachReply,
    /// First write that failed during the turn. The turn itself still
    /// completed in memory.
    pub storage_error: Option<StorageError>,
}

/// A mirror session driven turn by turn.
pub struct MirrorSessionFlow {
    sessions: Arc<SessionStore>,
    settings: Arc<SettingsStore>,
    coach: Arc<Coach>,
    speech: Arc<dyn Speech>,
    haptics: Arc<dyn Haptics>,
}

impl MirrorSessionFlow {
    pub fn new(
        sessions: Arc<SessionStore>,
        settings: Arc<SettingsStore>,
        coach: Arc<Coach>,
        speech: Arc<dyn Speech>,
        haptics: Arc<dyn Haptics>,
    ) -> Self {
        Self {
            sessions,
            settings,
            coach,
            speech,
            haptics,
        }
    }

    /// Send a user message. Blank input is ignored and yields `None`, as
    /// does a session that ended while the coach was answering.
    ///
    /// Failed writes do not interrupt the turn; the first one is returned
    /// in [`Exchange::storage_error`].
    pub async fn send(&self, text: &str) -> Option<Exchange> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut storage_error = None;
        if self.sessions.phase() == SessionPhase::Idle {
            if let Err(e) = self.sessions.start().await {
                storage_error.get_or_insert(e);
            }
        }

        let history = self
            .sessions
            .current()
            .map(|s| s.messages)
            .unwrap_or_default();

        let user = Message::new(Role::User, text);
        if !self.record(user.clone(), &mut storage_error).await {
            return None;
        }

        let reply = self.coach.mirror_response(text, &history).await;
        debug!(tone = ?reply.emotional_tone, fallback = reply.fallback, "Coach replied");

        let settings = self.settings.get();
        let mut assistant = Message::new(Role::Assistant, reply.content.clone());
        if settings.voice_enabled {
            assistant.is_voice = Some(true);
        }
        if !self.record(assistant.clone(), &mut storage_error).await {
            debug!("Session ended while the coach was answering");
            return None;
        }

        if settings.haptic_enabled {
            self.haptics.trigger(HapticKind::Light).await;
        }
        if settings.voice_enabled {
            self.speech.speak(&reply.content).await;
        }

        Some(Exchange {
            user,
            assistant,
            reply,
            storage_error,
        })
    }

    /// End the active session, optionally storing a generated summary first.
    ///
    /// Speech stops and the session is archived in memory even when a write
    /// fails; the first failure is returned.
    pub async fn finish(&self, summarize: bool) -> Result<Option<MirrorSession>, StorageError> {
        let Some(current) = self.sessions.current() else {
            return Ok(None);
        };

        let mut storage_error = None;
        if summarize && !current.messages.is_empty() {
            let summary = self.coach.session_summary(&current.messages).await;
            if let Err(e) = self.sessions.set_summary(summary).await {
                storage_error.get_or_insert(e);
            }
        }

        let ended = match self.sessions.end().await {
            Ok(ended) => ended,
            Err(e) => {
                storage_error.get_or_insert(e);
                None
            }
        };
        self.speech.stop().await;
        if self.settings.get().haptic_enabled {
            self.haptics.trigger(HapticKind::Success).await;
        }

        if let Some(session) = &ended {
            info!(session_id = %session.id, "Mirror session finished");
        }
        match storage_error {
            Some(e) => Err(e),
            None => Ok(ended),
        }
    }

    /// Append to the active session. `false` when no session is active.
    async fn record(&self, message: Message, first_error: &mut Option<StorageError>) -> bool {
        match self.sessions.append(message).await {
            Ok(appended) => appended,
            Err(e) => {
                first_error.get_or_insert(e);
                true
            }
        }
    }
}

/// Free-form chat with an in-memory transcript. Nothing here is persisted.
pub struct ChatFlow {
    coach: Arc<Coach>,
    transcript: Vec<Message>,
}

impl ChatFlow {
    pub fn new(coach: Arc<Coach>) -> Self {
        Self {
            coach,
            transcript: vec![Message::new(Role::Assistant, prompts::CHAT_GREETING)],
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Send a message and record both sides. Blank input yields `None`.
    pub async fn send(&mut self, text: &str) -> Option<CoachReply> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let reply = self.coach.chat_response(text, &self.transcript).await;
        self.transcript.push(Message::new(Role::User, text));
        self.transcript
            .push(Message::new(Role::Assistant, reply.content.clone()));
        Some(reply)
    }
}
