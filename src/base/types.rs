//! Common types and result aliases used throughout the application.

use serde::{Deserialize, Serialize};

/// Application-wide error type.
pub type Err = anyhow::Error;
/// Application-wide result type.
pub type Res<T> = Result<T, Err>;
/// Application-wide result type with no value.
pub type Void = Res<()>;

/// Speaker of a single conversation turn.
///
/// Serialized as the lowercase wire roles used by chat-completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions and grounding context.
    System,
    /// A message from a channel user.
    User,
    /// A previous reply from the bot.
    Assistant,
}

impl Role {
    /// The lowercase wire name for the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single turn of a conversation. Immutable once appended to a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke the turn.
    pub role: Role,
    /// The text of the turn.
    pub content: String,
}

impl Turn {
    /// A system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Per-channel conversation state, keyed by channel ID in the history store.
///
/// History ordering is chronological and append-only; it forms the model's
/// context window. The `model` field, once set, stays stable for the life of
/// the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Chronological, append-only sequence of turns.
    pub history: Vec<Turn>,
    /// Generation model pinned for this conversation. Falls back to the
    /// configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A passage returned by the vector index for a single request.
///
/// Ephemeral: produced per request, deduplicated by content, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// The passage text placed into the grounding context.
    pub content: String,
    /// Source metadata from the index match.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// An inbound chat message event. One per dispatch invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Channel the message was posted in.
    pub channel: String,
    /// Raw platform text, mention tokens included.
    pub user_message: String,
    /// The bot's own user ID, used for mention detection.
    pub bot_user_id: String,
    /// Platform subtype, e.g. `message_deleted`.
    pub subtype: Option<String>,
}

/// Fixed-shape acknowledgment returned by the event boundary regardless of
/// internal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAck {
    /// HTTP-style status code; always 200.
    pub status_code: u16,
    /// Human-readable acknowledgment body.
    pub message: String,
}

impl EventAck {
    /// The acknowledgment returned for every processed event.
    pub fn processed() -> Self {
        Self {
            status_code: 200,
            message: "Event processed successfully".to_string(),
        }
    }
}
