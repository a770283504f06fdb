//! In-memory repository implementations.
//!
//! Process-local stores over a mutex-guarded map. Used by embedded
//! callers that do not need durability, and by the engine integration
//! tests. Semantics mirror the TOML repositories: appends require the
//! owning record to exist, and writes bump `updated_at`.

use async_trait::async_trait;
use chrono::Utc;
use plumbline_core::conversation::{Conversation, ConversationMessage, ConversationRepository};
use plumbline_core::walkthrough::{WalkthroughRepository, WalkthroughSession, WalkthroughStep};
use plumbline_core::{PlumblineError, Result};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct ConversationState {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<ConversationMessage>>,
}

/// In-memory [`ConversationRepository`].
#[derive(Default)]
pub struct InMemoryConversationRepository {
    state: Mutex<ConversationState>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let state = self.state.lock().unwrap();
        Ok(state.conversations.get(conversation_id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        state
            .messages
            .entry(conversation.id.clone())
            .or_default();
        Ok(())
    }

    async fn update_summary(&self, conversation_id: &str, summary: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| PlumblineError::not_found("conversation", conversation_id))?;
        conversation.summary = Some(summary.to_string());
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn append_message(&self, message: &ConversationMessage) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| PlumblineError::not_found("conversation", &message.conversation_id))?;
        conversation.updated_at = Utc::now();
        state
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        let state = self.state.lock().unwrap();
        if !state.conversations.contains_key(conversation_id) {
            return Err(PlumblineError::not_found("conversation", conversation_id));
        }
        Ok(state
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn unsummarized_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMessage>> {
        let messages = self.messages(conversation_id).await?;
        Ok(messages.into_iter().filter(|m| !m.summarized).collect())
    }

    async fn mark_summarized(&self, conversation_id: &str, message_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.conversations.contains_key(conversation_id) {
            return Err(PlumblineError::not_found("conversation", conversation_id));
        }
        if let Some(messages) = state.messages.get_mut(conversation_id) {
            for message in messages.iter_mut() {
                if message_ids.contains(&message.id) {
                    message.summarized = true;
                }
            }
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let state = self.state.lock().unwrap();
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.conversations.remove(conversation_id);
        state.messages.remove(conversation_id);
        Ok(())
    }
}

#[derive(Default)]
struct WalkthroughState {
    sessions: HashMap<String, WalkthroughSession>,
    steps: HashMap<String, Vec<WalkthroughStep>>,
}

/// In-memory [`WalkthroughRepository`].
#[derive(Default)]
pub struct InMemoryWalkthroughRepository {
    state: Mutex<WalkthroughState>,
}

impl InMemoryWalkthroughRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalkthroughRepository for InMemoryWalkthroughRepository {
    async fn find_session(&self, session_id: &str) -> Result<Option<WalkthroughSession>> {
        let state = self.state.lock().unwrap();
        Ok(state.sessions.get(session_id).cloned())
    }

    async fn save_session(&self, session: &WalkthroughSession) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.insert(session.id.clone(), session.clone());
        state.steps.entry(session.id.clone()).or_default();
        Ok(())
    }

    async fn steps(&self, session_id: &str) -> Result<Vec<WalkthroughStep>> {
        let state = self.state.lock().unwrap();
        if !state.sessions.contains_key(session_id) {
            return Err(PlumblineError::not_found("walkthrough session", session_id));
        }
        let mut steps = state.steps.get(session_id).cloned().unwrap_or_default();
        steps.sort_by_key(|s| s.step_index);
        Ok(steps)
    }

    async fn find_step(
        &self,
        session_id: &str,
        step_index: usize,
    ) -> Result<Option<WalkthroughStep>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .steps
            .get(session_id)
            .and_then(|steps| steps.iter().find(|s| s.step_index == step_index).cloned()))
    }

    async fn save_step(&self, step: &WalkthroughStep) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .get_mut(&step.session_id)
            .ok_or_else(|| PlumblineError::not_found("walkthrough session", &step.session_id))?;
        session.updated_at = Utc::now();

        let steps = state.steps.entry(step.session_id.clone()).or_default();
        match steps.iter_mut().find(|s| s.step_index == step.step_index) {
            Some(existing) => *existing = step.clone(),
            None => steps.push(step.clone()),
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<WalkthroughSession>> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<WalkthroughSession> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}
