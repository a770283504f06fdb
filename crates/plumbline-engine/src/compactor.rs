//! Conversation context compaction.
//!
//! Long conversations are folded into a rolling summary so that turn
//! reconstruction stays within the completion service's context budget.
//! Compaction is best-effort: it runs after an exchange has been persisted,
//! and a failed summarization never fails the exchange that triggered it.

use plumbline_core::Result;
use plumbline_core::config::OrchestratorConfig;
use plumbline_core::conversation::ConversationRepository;
use plumbline_core::gateway::{CompletionGateway, Turn};
use plumbline_core::prompt::{PromptResolver, catalog, namespace};
use std::sync::Arc;
use std::time::Duration;

/// Placeholder injected when no summary exists yet.
const NO_PRIOR_SUMMARY: &str = "(none yet)";

/// Folds accumulated conversation history into the rolling summary.
///
/// The compactor reads the messages not yet covered by the summary, and
/// only acts once their combined length crosses the configured threshold.
/// It then asks the completion service to merge them with the prior summary
/// and marks exactly the messages it read as summarized, so a message is
/// never folded into two different summaries.
///
/// Runs under the caller's per-conversation lock; the read-summarize-mark
/// sequence is never concurrent with another exchange on the same
/// conversation.
pub struct ContextCompactor {
    conversation_repository: Arc<dyn ConversationRepository>,
    gateway: Arc<dyn CompletionGateway>,
    prompt_resolver: Arc<dyn PromptResolver>,
    config: OrchestratorConfig,
}

impl ContextCompactor {
    pub fn new(
        conversation_repository: Arc<dyn ConversationRepository>,
        gateway: Arc<dyn CompletionGateway>,
        prompt_resolver: Arc<dyn PromptResolver>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            conversation_repository,
            gateway,
            prompt_resolver,
            config,
        }
    }

    /// Compacts the conversation if its unsummarized history has grown past
    /// the threshold.
    ///
    /// Returns `Err` only when the initial store reads fail; everything after
    /// the threshold decision (prompt resolution, the summarization call,
    /// persisting the result) is logged at `warn` and swallowed, leaving the
    /// conversation unchanged for the next attempt.
    pub async fn maybe_compact(&self, conversation_id: &str) -> Result<()> {
        let pending = self
            .conversation_repository
            .unsummarized_messages(conversation_id)
            .await?;
        let pending_chars: usize = pending.iter().map(|m| m.content.chars().count()).sum();
        if pending_chars < self.config.compaction_threshold_chars {
            return Ok(());
        }

        let Some(conversation) = self.conversation_repository.find_by_id(conversation_id).await?
        else {
            tracing::warn!(
                "[ContextCompactor] Conversation '{}' disappeared before compaction",
                conversation_id
            );
            return Ok(());
        };

        let template = match self
            .prompt_resolver
            .get_prompt(namespace::SYSTEM, catalog::SUMMARIZATION_KEY)
            .await
        {
            Ok(template) => template,
            Err(err) => {
                tracing::warn!(
                    "[ContextCompactor] Summarization template unavailable: {}",
                    err
                );
                return Ok(());
            }
        };

        let prior_summary = conversation
            .summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_PRIOR_SUMMARY);
        let transcript: Vec<String> = pending
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect();
        let prompt = format!(
            "{template}\n\nPrior summary:\n{prior_summary}\n\nConversation:\n{}",
            transcript.join("\n")
        );

        // Captured before the call: only the messages that went into the
        // prompt get marked, whatever arrives in the meantime.
        let message_ids: Vec<String> = pending.iter().map(|m| m.id.clone()).collect();

        let deadline = Duration::from_secs(self.config.compaction_deadline_secs);
        let turns = [Turn::user(prompt)];
        let summary = match tokio::time::timeout(deadline, self.gateway.complete(&turns)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                tracing::warn!(
                    "[ContextCompactor] Summarization failed for conversation '{}': {}",
                    conversation_id,
                    err
                );
                return Ok(());
            }
            Err(_) => {
                tracing::warn!(
                    "[ContextCompactor] Summarization timed out for conversation '{}'",
                    conversation_id
                );
                return Ok(());
            }
        };

        let summary = summary.trim();
        if summary.is_empty() {
            tracing::warn!(
                "[ContextCompactor] Empty summary returned for conversation '{}'; keeping history",
                conversation_id
            );
            return Ok(());
        }

        if let Err(err) = self
            .conversation_repository
            .update_summary(conversation_id, summary)
            .await
        {
            tracing::warn!(
                "[ContextCompactor] Failed to persist summary for conversation '{}': {}",
                conversation_id,
                err
            );
            return Ok(());
        }
        if let Err(err) = self
            .conversation_repository
            .mark_summarized(conversation_id, &message_ids)
            .await
        {
            // The summary already covers these messages; the next pass will
            // fold them again, which rewrites the same content.
            tracing::warn!(
                "[ContextCompactor] Failed to mark {} messages summarized in '{}': {}",
                message_ids.len(),
                conversation_id,
                err
            );
            return Ok(());
        }

        tracing::info!(
            "[ContextCompactor] Folded {} messages ({} chars) into summary for conversation '{}'",
            message_ids.len(),
            pending_chars,
            conversation_id
        );
        Ok(())
    }
}
