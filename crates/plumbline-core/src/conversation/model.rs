//! Conversation domain model.
//!
//! This module contains the core Conversation entity and its messages,
//! the durable record every exchange with the completion service builds on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A durable conversation with the completion service.
///
/// A conversation contains:
/// - A rolling summary maintained by the context compactor
/// - Ordered prompt-key tags used to select the system persona when the
///   turn sequence is reconstructed
/// - Timestamps for creation and last update
///
/// The message history itself is stored separately (one
/// [`ConversationMessage`] per turn); the conversation record only carries
/// the state that survives compaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier (UUID format)
    pub id: String,
    /// ID of the user who owns this conversation
    pub user_id: String,
    /// Human-readable title, derived from the opening prompt
    pub title: String,
    /// Rolling summary of compacted history; `None` until the first compaction
    #[serde(default)]
    pub summary: Option<String>,
    /// Ordered prompt-key tags; the first tag selects the persona prompt
    #[serde(default)]
    pub prompt_tags: Vec<String>,
    /// Timestamp when the conversation was created
    pub created_at: DateTime<Utc>,
    /// Timestamp when the conversation was last updated
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates a new conversation owned by `user_id`.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, prompt_tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            summary: None,
            prompt_tags,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a usable (non-empty) summary exists.
    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Bumps the updated timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Represents the author of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user (or the orchestrator on their behalf).
    User,
    /// Message from the model.
    Model,
}

impl MessageRole {
    /// Label used when flattening history into a summarization prompt.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A single message in a conversation history.
///
/// Messages are immutable once created, except for the `summarized` flag
/// which the compactor flips exactly once, false to true, after folding
/// the message into the rolling summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message identifier (UUID format)
    pub id: String,
    /// ID of the conversation this message belongs to
    pub conversation_id: String,
    /// The role of the message author
    pub role: MessageRole,
    /// The text content of the message
    pub content: String,
    /// Whether this message has been folded into the rolling summary
    #[serde(default)]
    pub summarized: bool,
    /// Timestamp when the message was created
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    /// Creates a new, not-yet-summarized message.
    pub fn new(
        conversation_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            summarized: false,
            created_at: Utc::now(),
        }
    }
}
