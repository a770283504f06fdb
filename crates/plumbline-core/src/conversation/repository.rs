//! Conversation repository trait.
//!
//! Defines the interface for conversation and message persistence.

use super::model::{Conversation, ConversationMessage};
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for conversations and their messages.
///
/// This trait defines the contract for persisting and retrieving
/// conversations, decoupling the orchestration engines from the specific
/// storage mechanism (e.g., TOML files, database, remote API).
///
/// # Implementation Notes
///
/// Implementations should handle:
/// - Message ordering by creation time
/// - The `summarized` flag transition as an atomic-enough batch so a
///   message is never folded into two different summaries
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Finds a conversation by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Conversation))`: Conversation found
    /// - `Ok(None)`: Conversation not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Saves a conversation record (insert or full replace).
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    /// Replaces the conversation's rolling summary with `summary`.
    ///
    /// The summary only ever moves forward: callers pass the consolidated
    /// text covering strictly more history than the previous one.
    async fn update_summary(&self, conversation_id: &str, summary: &str) -> Result<()>;

    /// Appends a message to the conversation's history.
    async fn append_message(&self, message: &ConversationMessage) -> Result<()>;

    /// Returns every message of the conversation in creation order.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>>;

    /// Returns the messages not yet folded into the summary, in creation order.
    async fn unsummarized_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>>;

    /// Marks the given messages as summarized.
    ///
    /// IDs not present in the conversation are ignored; the flag never
    /// transitions back to false.
    async fn mark_summarized(&self, conversation_id: &str, message_ids: &[String]) -> Result<()>;

    /// Lists all conversations owned by `user_id`, most recently updated first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// Deletes a conversation and its messages.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Conversation deleted (or didn't exist)
    /// - `Err(_)`: Error occurred during deletion
    async fn delete(&self, conversation_id: &str) -> Result<()>;
}
