//! Conversation exchange engine.
//!
//! This module provides the `ConversationEngine`, which turns one user
//! prompt into one completion-service exchange: it reconstructs the turn
//! sequence from durable state, calls the gateway, persists the new turn
//! pair, and hands the conversation to the compactor.
//!
//! # Responsibilities
//!
//! - Creating conversations on first contact and enforcing ownership
//! - Deterministic turn reconstruction (persona, summary, history, prompt)
//! - Inlining uploaded documents into the prompt turn
//! - Deadline enforcement on gateway and blob-store calls
//! - Persisting exchanges only after the completion call succeeded
//! - Failure-sentinel recovery via a single corrective exchange
//!
//! # Thread Safety
//!
//! All collaborators are shared behind `Arc`; exchanges on the same
//! conversation are serialized by a per-conversation async lock, while
//! different conversations proceed in parallel.

use crate::compactor::ContextCompactor;
use crate::failure::FailureDetector;
use crate::locks::KeyedLocks;
use plumbline_core::blob::BlobStore;
use plumbline_core::config::OrchestratorConfig;
use plumbline_core::conversation::{
    Conversation, ConversationMessage, ConversationRepository, MessageRole,
};
use plumbline_core::gateway::{CompletionGateway, GatewayError, InlineAttachment, Turn};
use plumbline_core::prompt::{PromptResolver, catalog, namespace};
use plumbline_core::{PlumblineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Synthetic acknowledgment inserted after the persona turn.
const PERSONA_ACK: &str = "Understood. I will analyse the supplied material in that role.";

/// Synthetic acknowledgment inserted after the summary turn.
const SUMMARY_ACK: &str = "Acknowledged. I will treat that summary as established context.";

/// Header line introducing the rolling summary in the turn sequence.
const SUMMARY_HEADER: &str = "Summary of the conversation so far:";

/// Title used when the opening prompt has no usable first line.
const FALLBACK_TITLE: &str = "Untitled analysis";

/// One exchange request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// Conversation to continue; `None` starts a new one.
    pub conversation_id: Option<String>,
    /// The requesting user; must own the conversation.
    pub user_id: String,
    /// The user's prompt text.
    pub prompt: String,
    /// Blob references to resolve and inline into the prompt turn.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Prompt tags for a newly created conversation; ignored when the
    /// conversation already exists.
    #[serde(default)]
    pub prompt_tags: Vec<String>,
    /// Whether this exchange is a walkthrough analysis turn. Analysis turns
    /// skip compaction unless configured otherwise.
    #[serde(default)]
    pub is_analysis_turn: bool,
}

/// The result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    /// The conversation the exchange ran against (fresh id for new ones).
    pub conversation_id: String,
    /// The model's response text.
    pub text: String,
}

/// Engine for single prompt/response exchanges against durable conversations.
pub struct ConversationEngine {
    /// Repository for conversation and message persistence
    conversation_repository: Arc<dyn ConversationRepository>,
    /// Gateway to the external completion service
    gateway: Arc<dyn CompletionGateway>,
    /// Read-only prompt content store
    prompt_resolver: Arc<dyn PromptResolver>,
    /// Store resolving attachment references to raw bytes
    blob_store: Arc<dyn BlobStore>,
    /// Policy constants (thresholds, deadlines, sentinel)
    config: OrchestratorConfig,
    /// Rolling-summary compactor, run after an exchange is persisted
    compactor: ContextCompactor,
    /// Sentinel detector for recovery-enabled exchanges
    failure_detector: FailureDetector,
    /// Per-conversation exchange locks
    conversation_locks: KeyedLocks,
}

impl ConversationEngine {
    /// Creates a new `ConversationEngine`.
    ///
    /// # Arguments
    ///
    /// * `conversation_repository` - Repository for conversations and messages
    /// * `gateway` - Gateway to the completion service
    /// * `prompt_resolver` - Read-only prompt content store
    /// * `blob_store` - Store resolving attachment references
    /// * `config` - Policy constants
    pub fn new(
        conversation_repository: Arc<dyn ConversationRepository>,
        gateway: Arc<dyn CompletionGateway>,
        prompt_resolver: Arc<dyn PromptResolver>,
        blob_store: Arc<dyn BlobStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let compactor = ContextCompactor::new(
            conversation_repository.clone(),
            gateway.clone(),
            prompt_resolver.clone(),
            config.clone(),
        );
        let failure_detector = FailureDetector::new(config.failure_sentinel.clone());
        Self {
            conversation_repository,
            gateway,
            prompt_resolver,
            blob_store,
            config,
            compactor,
            failure_detector,
            conversation_locks: KeyedLocks::new(),
        }
    }

    /// Runs one exchange: reconstruct turns, call the gateway, persist the
    /// new turn pair, compact if due.
    ///
    /// Holds the conversation's lock for the whole sequence, so concurrent
    /// exchanges on one conversation serialize and each sees the turns the
    /// previous one persisted.
    ///
    /// # Returns
    ///
    /// - `Ok(ExchangeOutcome)`: The response text and conversation id
    /// - `Err(PlumblineError::NotFound)`: No conversation under the given id
    /// - `Err(PlumblineError::Unauthorized)`: Caller does not own it
    /// - `Err(PlumblineError::Gateway)`: The completion call failed; nothing
    ///   was persisted for the attempt
    pub async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeOutcome> {
        match request.conversation_id.clone() {
            Some(id) => {
                let _guard = self.conversation_locks.acquire(&id).await;
                let conversation = self
                    .conversation_repository
                    .find_by_id(&id)
                    .await?
                    .ok_or_else(|| PlumblineError::not_found("conversation", id.clone()))?;
                if conversation.user_id != request.user_id {
                    return Err(PlumblineError::unauthorized("conversation", id));
                }
                self.run_exchange(conversation, &request).await
            }
            None => {
                let conversation = Conversation::new(
                    request.user_id.clone(),
                    derive_title(&request.prompt, self.config.title_max_chars),
                    request.prompt_tags.clone(),
                );
                let _guard = self.conversation_locks.acquire(&conversation.id).await;
                self.conversation_repository.save(&conversation).await?;
                tracing::info!(
                    "[ConversationEngine] Created conversation '{}' for user '{}'",
                    conversation.id,
                    conversation.user_id
                );
                self.run_exchange(conversation, &request).await
            }
        }
    }

    /// Runs one exchange and, when the response carries the failure
    /// sentinel, exactly one corrective follow-up exchange.
    ///
    /// The corrective exchange replays the corrective-action directive plus
    /// a labeled copy of the failed response on the same conversation, with
    /// no attachments. Its outcome is final even if the sentinel appears
    /// again; the failed attempt stays in message history.
    pub async fn exchange_with_recovery(
        &self,
        request: ExchangeRequest,
    ) -> Result<ExchangeOutcome> {
        let user_id = request.user_id.clone();
        let is_analysis_turn = request.is_analysis_turn;

        let first = self.exchange(request).await?;
        let tagged = self.failure_detector.tag(first.text);
        if !tagged.failure_signaled {
            return Ok(ExchangeOutcome {
                conversation_id: first.conversation_id,
                text: tagged.text,
            });
        }

        tracing::warn!(
            "[ConversationEngine] Failure sentinel detected in conversation '{}'; issuing corrective exchange",
            first.conversation_id
        );
        let directive = self
            .prompt_resolver
            .get_prompt(namespace::SYSTEM, catalog::CORRECTIVE_ACTION_KEY)
            .await?;
        let corrective_prompt = format!("{directive}\n\nPrevious response:\n{}", tagged.text);

        self.exchange(ExchangeRequest {
            conversation_id: Some(first.conversation_id),
            user_id,
            prompt: corrective_prompt,
            attachments: Vec::new(),
            prompt_tags: Vec::new(),
            is_analysis_turn,
        })
        .await
    }

    async fn run_exchange(
        &self,
        conversation: Conversation,
        request: &ExchangeRequest,
    ) -> Result<ExchangeOutcome> {
        let turns = self.assemble_turns(&conversation, request).await?;

        let deadline = Duration::from_secs(self.config.gateway_deadline_secs);
        let response = match tokio::time::timeout(deadline, self.gateway.complete(&turns)).await {
            Ok(result) => result.map_err(PlumblineError::from)?,
            Err(_) => return Err(GatewayError::Timeout.into()),
        };

        let user_message = ConversationMessage::new(
            conversation.id.clone(),
            MessageRole::User,
            request.prompt.clone(),
        );
        self.conversation_repository
            .append_message(&user_message)
            .await?;
        let model_message = ConversationMessage::new(
            conversation.id.clone(),
            MessageRole::Model,
            response.clone(),
        );
        self.conversation_repository
            .append_message(&model_message)
            .await?;

        if !request.is_analysis_turn || self.config.compact_analysis_turns {
            if let Err(err) = self.compactor.maybe_compact(&conversation.id).await {
                tracing::warn!(
                    "[ConversationEngine] Compaction failed for conversation '{}': {}",
                    conversation.id,
                    err
                );
            }
        }

        Ok(ExchangeOutcome {
            conversation_id: conversation.id,
            text: response,
        })
    }

    /// Reconstructs the full turn sequence for one gateway call.
    ///
    /// Order is fixed: persona turn plus synthetic acknowledgment (when the
    /// conversation carries prompt tags), summary turn plus acknowledgment
    /// (when a non-empty summary exists), every unsummarized message in
    /// creation order, then the new prompt turn with its attachments.
    async fn assemble_turns(
        &self,
        conversation: &Conversation,
        request: &ExchangeRequest,
    ) -> Result<Vec<Turn>> {
        let mut turns = Vec::new();

        if let Some(tag) = conversation.prompt_tags.first() {
            let persona = self
                .prompt_resolver
                .get_prompt(namespace::PERSONA, tag)
                .await?;
            turns.push(Turn::user(persona));
            turns.push(Turn::model(PERSONA_ACK));
        }

        if let Some(summary) = conversation.summary.as_deref().filter(|s| !s.is_empty()) {
            turns.push(Turn::user(format!("{SUMMARY_HEADER}\n{summary}")));
            turns.push(Turn::model(SUMMARY_ACK));
        }

        for message in self
            .conversation_repository
            .unsummarized_messages(&conversation.id)
            .await?
        {
            let turn = match message.role {
                MessageRole::User => Turn::user(message.content),
                MessageRole::Model => Turn::model(message.content),
            };
            turns.push(turn);
        }

        let attachments = self.resolve_attachments(&request.attachments).await;
        turns.push(Turn::user(request.prompt.clone()).with_attachments(attachments));

        Ok(turns)
    }

    /// Lists the user's conversations, most recently updated first.
    pub async fn conversations_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.conversation_repository.list_for_user(user_id).await
    }

    /// Resolves attachment references in parallel.
    ///
    /// Each reference gets its own deadline; a failed or timed-out fetch is
    /// logged and skipped without affecting the others or the exchange.
    async fn resolve_attachments(&self, references: &[String]) -> Vec<InlineAttachment> {
        if references.is_empty() {
            return Vec::new();
        }

        let deadline = Duration::from_secs(self.config.blob_deadline_secs);
        let fetches = references.iter().map(|reference| async move {
            let resolved = tokio::time::timeout(deadline, self.blob_store.resolve(reference)).await;
            (reference, resolved)
        });

        let mut attachments = Vec::new();
        for (reference, resolved) in futures::future::join_all(fetches).await {
            match resolved {
                Ok(Ok(blob)) => attachments.push(InlineAttachment {
                    mime_type: blob.mime_type,
                    data: blob.bytes,
                }),
                Ok(Err(err)) => {
                    tracing::warn!(
                        "[ConversationEngine] Skipping attachment '{}': {}",
                        reference,
                        err
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "[ConversationEngine] Skipping attachment '{}': fetch timed out",
                        reference
                    );
                }
            }
        }
        attachments
    }
}

/// Derives a conversation title from the opening prompt's first line,
/// truncated to `max_chars`.
fn derive_title(prompt: &str, max_chars: usize) -> String {
    let first_line = prompt.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let truncated: String = first_line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}
