//! Coach — the chat-completion collaborator behind mirror sessions and chat.
//!
//! Every provider failure is contained here: callers always get text back,
//! either the model's reply or a canned fallback.

pub mod prompts;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::state::{Message, Role};

const MIRROR_TEMPERATURE: f32 = 0.7;
const MIRROR_MAX_TOKENS: u32 = 150;
const CHAT_TEMPERATURE: f32 = 0.8;
const CHAT_MAX_TOKENS: u32 = 250;
const SUMMARY_TEMPERATURE: f32 = 0.5;
const SUMMARY_MAX_TOKENS: u32 = 120;

/// Coarse emotional tone of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionalTone {
    Positive,
    Sad,
    Angry,
    Anxious,
    Neutral,
}

impl EmotionalTone {
    /// Keyword match, first category wins.
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if any(&["happy", "great", "excited"]) {
            Self::Positive
        } else if any(&["sad", "down", "depressed"]) {
            Self::Sad
        } else if any(&["angry", "frustrated", "annoyed"]) {
            Self::Angry
        } else if any(&["anxious", "worried", "nervous"]) {
            Self::Anxious
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for EmotionalTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Positive => "positive",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Anxious => "anxious",
            Self::Neutral => "neutral",
        };
        write!(f, "{s}")
    }
}

/// A coach reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachReply {
    pub content: String,
    pub emotional_tone: Option<EmotionalTone>,
    /// Set when the provider failed and `content` is the canned fallback.
    pub fallback: bool,
}

impl CoachReply {
    fn fallback() -> Self {
        Self {
            content: prompts::FALLBACK_REPLY.to_string(),
            emotional_tone: None,
            fallback: true,
        }
    }
}

pub struct Coach {
    llm: Arc<dyn LlmProvider>,
    max_history_turns: usize,
}

impl Coach {
    pub fn new(llm: Arc<dyn LlmProvider>, max_history_turns: usize) -> Self {
        Self {
            llm,
            max_history_turns,
        }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Reflective reply for a mirror session.
    pub async fn mirror_response(&self, user_message: &str, history: &[Message]) -> CoachReply {
        let request = CompletionRequest::new(self.build_messages(
            prompts::MIRROR_SYSTEM_PROMPT,
            history,
            user_message,
        ))
        .with_temperature(MIRROR_TEMPERATURE)
        .with_max_tokens(MIRROR_MAX_TOKENS);

        match self.complete("mirror", request).await {
            Ok(content) => CoachReply {
                content: non_empty_or(content, prompts::MIRROR_EMPTY_REPLY),
                emotional_tone: Some(EmotionalTone::detect(user_message)),
                fallback: false,
            },
            Err(e) => {
                warn!(error = %e, "Mirror response failed, using fallback");
                CoachReply::fallback()
            }
        }
    }

    /// Free-form companion chat reply.
    pub async fn chat_response(&self, user_message: &str, history: &[Message]) -> CoachReply {
        let request = CompletionRequest::new(self.build_messages(
            prompts::CHAT_SYSTEM_PROMPT,
            history,
            user_message,
        ))
        .with_temperature(CHAT_TEMPERATURE)
        .with_max_tokens(CHAT_MAX_TOKENS);

        match self.complete("chat", request).await {
            Ok(content) => CoachReply {
                content: non_empty_or(content, prompts::CHAT_EMPTY_REPLY),
                emotional_tone: None,
                fallback: false,
            },
            Err(e) => {
                warn!(error = %e, "Chat response failed, using fallback");
                CoachReply::fallback()
            }
        }
    }

    /// Two or three sentence summary of a finished conversation.
    pub async fn session_summary(&self, messages: &[Message]) -> String {
        if messages.is_empty() {
            return prompts::SUMMARY_EMPTY.to_string();
        }

        let transcript = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let request =
            CompletionRequest::new(vec![ChatMessage::user(prompts::summary_prompt(&transcript))])
                .with_temperature(SUMMARY_TEMPERATURE)
                .with_max_tokens(SUMMARY_MAX_TOKENS);

        match self.complete("summary", request).await {
            Ok(content) => non_empty_or(content, prompts::SUMMARY_EMPTY),
            Err(e) => {
                warn!(error = %e, "Summary generation failed");
                prompts::SUMMARY_FALLBACK.to_string()
            }
        }
    }

    /// Run one completion and log its token usage.
    async fn complete(
        &self,
        purpose: &'static str,
        request: CompletionRequest,
    ) -> Result<String, LlmError> {
        let response = self.llm.complete(request).await?;
        debug!(
            purpose,
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            tokens_used = response.input_tokens + response.output_tokens,
            response_id = response.response_id.as_deref().unwrap_or("-"),
            "Completion finished"
        );
        if response.finish_reason == FinishReason::Length {
            warn!(purpose, "Completion cut off at the token limit");
        }
        Ok(response.content)
    }

    /// System prompt, the most recent `max_history_turns` messages, then the new user turn.
    fn build_messages(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
    ) -> Vec<ChatMessage> {
        let skip = history.len().saturating_sub(self.max_history_turns);
        if skip > 0 {
            debug!(dropped = skip, "Trimming conversation history");
        }

        let mut messages = Vec::with_capacity(history.len() - skip + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(history[skip..].iter().map(|m| match m.role {
            Role::User => ChatMessage::user(&m.content),
            Role::Assistant => ChatMessage::assistant(&m.content),
        }));
        messages.push(ChatMessage::user(user_message));
        messages
    }
}

fn non_empty_or(content: String, fallback: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::StubLlm;
    use super::*;
    use crate::llm::ChatRole;

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                Message::new(role, format!("turn {i}"))
            })
            .collect()
    }

    #[tokio::test]
    async fn mirror_response_uses_history_and_detects_tone() {
        let llm = Arc::new(StubLlm::replying("That sounds exciting."));
        let coach = Coach::new(llm.clone(), 20);

        let reply = coach
            .mirror_response("I'm so happy today", &history(2))
            .await;
        assert_eq!(reply.content, "That sounds exciting.");
        assert_eq!(reply.emotional_tone, Some(EmotionalTone::Positive));
        assert!(!reply.fallback);

        let request = llm.last_request();
        assert_eq!(request.temperature, Some(MIRROR_TEMPERATURE));
        assert_eq!(request.max_tokens, Some(MIRROR_MAX_TOKENS));
        let roles: Vec<ChatRole> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(request.messages[3].content, "I'm so happy today");
    }

    #[tokio::test]
    async fn history_is_bounded_to_most_recent_turns() {
        let llm = Arc::new(StubLlm::replying("ok"));
        let coach = Coach::new(llm.clone(), 3);

        coach.chat_response("latest", &history(10)).await;
        let request = llm.last_request();
        // system + 3 history + new user turn
        assert_eq!(request.messages.len(), 5);
        assert_eq!(request.messages[1].content, "turn 7");
        assert_eq!(request.messages[3].content, "turn 9");
    }

    #[tokio::test]
    async fn provider_failure_yields_fallback() {
        let coach = Coach::new(Arc::new(StubLlm::failing()), 20);

        let mirror = coach.mirror_response("hello", &[]).await;
        assert!(mirror.fallback);
        assert_eq!(mirror.content, prompts::FALLBACK_REPLY);

        let chat = coach.chat_response("hello", &[]).await;
        assert!(chat.fallback);
        assert_eq!(chat.content, prompts::FALLBACK_REPLY);

        let summary = coach.session_summary(&history(2)).await;
        assert_eq!(summary, prompts::SUMMARY_FALLBACK);
    }

    #[tokio::test]
    async fn empty_completion_uses_canned_text() {
        let coach = Coach::new(Arc::new(StubLlm::replying("   ")), 20);
        assert_eq!(
            coach.mirror_response("hi", &[]).await.content,
            prompts::MIRROR_EMPTY_REPLY
        );
        assert_eq!(
            coach.chat_response("hi", &[]).await.content,
            prompts::CHAT_EMPTY_REPLY
        );
    }

    #[tokio::test]
    async fn summary_sends_transcript() {
        let llm = Arc::new(StubLlm::replying("You reflected on work stress."));
        let coach = Coach::new(llm.clone(), 20);

        let messages = vec![
            Message::new(Role::User, "Work is a lot"),
            Message::new(Role::Assistant, "What weighs most?"),
        ];
        let summary = coach.session_summary(&messages).await;
        assert_eq!(summary, "You reflected on work stress.");

        let request = llm.last_request();
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0]
            .content
            .contains("user: Work is a lot\nassistant: What weighs most?"));
        assert_eq!(request.temperature, Some(SUMMARY_TEMPERATURE));
    }

    #[tokio::test]
    async fn summary_of_empty_session_skips_provider() {
        let llm = Arc::new(StubLlm::replying("unused"));
        let coach = Coach::new(llm.clone(), 20);
        assert_eq!(coach.session_summary(&[]).await, prompts::SUMMARY_EMPTY);
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn tone_detection() {
        assert_eq!(EmotionalTone::detect("Feeling GREAT"), EmotionalTone::Positive);
        assert_eq!(EmotionalTone::detect("a bit down lately"), EmotionalTone::Sad);
        assert_eq!(EmotionalTone::detect("so frustrated"), EmotionalTone::Angry);
        assert_eq!(EmotionalTone::detect("worried about tomorrow"), EmotionalTone::Anxious);
        assert_eq!(EmotionalTone::detect("just a day"), EmotionalTone::Neutral);
    }
}
