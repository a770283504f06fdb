//! TOML-based ConversationRepository implementation

use crate::storage::AtomicTomlFile;
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::Utc;
use plumbline_core::conversation::{Conversation, ConversationMessage, ConversationRepository};
use plumbline_core::{PlumblineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk document: the conversation record plus its message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationDoc {
    conversation: Conversation,
    #[serde(default)]
    messages: Vec<ConversationMessage>,
}

/// A repository implementation storing each conversation in one TOML file.
///
/// Directory layout:
/// ```text
/// base_dir/
/// └── conversations/
///     ├── <conversation-id-1>.toml
///     └── <conversation-id-2>.toml
/// ```
///
/// Message-appending and summary updates run as locked read-modify-write
/// cycles on the conversation's file, so concurrent writers from other
/// processes cannot lose messages or mark a message into two summaries.
pub struct TomlConversationRepository {
    base_dir: PathBuf,
}

impl TomlConversationRepository {
    /// Creates a new repository rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory structure cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> AnyResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        let conversations_dir = base_dir.join("conversations");
        fs::create_dir_all(&conversations_dir)
            .context("Failed to create conversations directory")?;

        Ok(Self { base_dir })
    }

    /// Creates a repository at the default location (~/.plumbline).
    pub fn default_location() -> AnyResult<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Self::new(home_dir.join(".plumbline"))
    }

    fn conversation_file_path(&self, conversation_id: &str) -> PathBuf {
        self.base_dir
            .join("conversations")
            .join(format!("{}.toml", conversation_id))
    }

    fn handle(&self, conversation_id: &str) -> AtomicTomlFile<ConversationDoc> {
        AtomicTomlFile::new(self.conversation_file_path(conversation_id))
    }

    /// Loads the document, failing with NotFound when no file exists.
    fn load_existing(&self, conversation_id: &str) -> Result<ConversationDoc> {
        self.handle(conversation_id)
            .load()?
            .ok_or_else(|| PlumblineError::not_found("conversation", conversation_id))
    }

    /// Runs a locked mutation against an existing conversation document.
    fn mutate_existing<F>(&self, conversation_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ConversationDoc) -> Result<()>,
    {
        // Existence check first so a mutation never creates a record
        let current = self.load_existing(conversation_id)?;
        self.handle(conversation_id).update(current, f)
    }
}

#[async_trait]
impl ConversationRepository for TomlConversationRepository {
    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let doc = self.handle(conversation_id).load()?;
        Ok(doc.map(|d| d.conversation))
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let default_doc = ConversationDoc {
            conversation: conversation.clone(),
            messages: Vec::new(),
        };
        // Replace the record, keep whatever history the file already holds
        self.handle(&conversation.id).update(default_doc, |doc| {
            doc.conversation = conversation.clone();
            Ok(())
        })
    }

    async fn update_summary(&self, conversation_id: &str, summary: &str) -> Result<()> {
        self.mutate_existing(conversation_id, |doc| {
            doc.conversation.summary = Some(summary.to_string());
            doc.conversation.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn append_message(&self, message: &ConversationMessage) -> Result<()> {
        self.mutate_existing(&message.conversation_id, |doc| {
            doc.messages.push(message.clone());
            doc.conversation.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        let mut messages = self.load_existing(conversation_id)?.messages;
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn unsummarized_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMessage>> {
        let mut messages = self.load_existing(conversation_id)?.messages;
        messages.retain(|m| !m.summarized);
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn mark_summarized(&self, conversation_id: &str, message_ids: &[String]) -> Result<()> {
        self.mutate_existing(conversation_id, |doc| {
            for message in doc.messages.iter_mut() {
                if message_ids.contains(&message.id) {
                    message.summarized = true;
                }
            }
            Ok(())
        })
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let conversations_dir = self.base_dir.join("conversations");
        let mut conversations = Vec::new();

        for entry in fs::read_dir(&conversations_dir)
            .map_err(|e| PlumblineError::io(format!("failed to read conversations dir: {e}")))?
        {
            let entry = entry.map_err(PlumblineError::from)?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                // Unreadable files are skipped, not fatal for a listing
                match AtomicTomlFile::<ConversationDoc>::new(path.clone()).load() {
                    Ok(Some(doc)) if doc.conversation.user_id == user_id => {
                        conversations.push(doc.conversation);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            "[TomlConversationRepository] Skipping unreadable file {:?}: {}",
                            path,
                            e
                        );
                    }
                }
            }
        }

        // Sort by updated_at descending (most recent first)
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(conversations)
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let file_path = self.conversation_file_path(conversation_id);

        if file_path.exists() {
            fs::remove_file(&file_path).map_err(|e| {
                PlumblineError::io(format!("failed to delete {}: {e}", file_path.display()))
            })?;
        }

        Ok(())
    }
}
