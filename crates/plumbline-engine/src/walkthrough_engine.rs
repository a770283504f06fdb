//! Walkthrough workflow engine.
//!
//! This module provides the `WalkthroughEngine`, which drives multi-step
//! analysis pipelines: a frozen sequence of analysis prompts executed one
//! step at a time over a single shared conversation, with human review
//! folded back in through step reruns.
//!
//! # Responsibilities
//!
//! - Freezing the prompt-key sequence when a session starts
//! - Advancing exactly one step per request, in sequence order
//! - Signalling completion as a typed terminal condition
//! - Rerunning a reviewed step in place, preserving the reviewer's edits
//! - Appending the value-engineering directive on request
//!
//! # Thread Safety
//!
//! Advances and reruns on one session are serialized by a per-session async
//! lock. Step exchanges go through the `ConversationEngine`, which nests its
//! own per-conversation lock inside the session lock; the registries are
//! distinct, so the nesting cannot self-deadlock.

use crate::conversation_engine::{ConversationEngine, ExchangeRequest};
use crate::locks::KeyedLocks;
use chrono::Utc;
use plumbline_core::prompt::{PromptResolver, catalog, namespace};
use plumbline_core::walkthrough::{
    AnalysisKind, WalkthroughRepository, WalkthroughSession, WalkthroughStep,
};
use plumbline_core::{PlumblineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request to start a walkthrough session.
///
/// The caller has already run the opening exchange (attachments, failure
/// recovery) through the `ConversationEngine`; this request carries the
/// resulting conversation and response so the session can record them as
/// its first step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    /// The user starting the session.
    pub user_id: String,
    /// Optional reference to the job the analysis belongs to.
    #[serde(default)]
    pub job_ref: Option<String>,
    /// Which canonical sequence to follow.
    pub analysis_kind: AnalysisKind,
    /// Caller-supplied sequence when `analysis_kind` is `Selected`;
    /// ignored for the canonical kinds.
    #[serde(default)]
    pub selected_prompt_keys: Vec<String>,
    /// The conversation the opening exchange ran against.
    pub conversation_id: String,
    /// The opening exchange's response, recorded as step 0.
    pub step_zero_response: String,
}

/// Request to rerun a step after human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerunRequest {
    /// The response the reviewer started from.
    pub original_response: String,
    /// The reviewer's edited version; its changes must survive verbatim.
    pub edited_response: String,
    /// Free-text reviewer comments to address, if any.
    #[serde(default)]
    pub comments: Option<String>,
    /// Whether to append the value-engineering directive.
    #[serde(default)]
    pub apply_cost_optimisation: bool,
}

/// A session together with its steps, ordered by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: WalkthroughSession,
    pub steps: Vec<WalkthroughStep>,
}

/// Engine for multi-step analysis walkthroughs.
pub struct WalkthroughEngine {
    /// Repository for session and step persistence
    walkthrough_repository: Arc<dyn WalkthroughRepository>,
    /// Engine every step exchange runs through
    conversation_engine: Arc<ConversationEngine>,
    /// Read-only prompt content store
    prompt_resolver: Arc<dyn PromptResolver>,
    /// Per-session advance locks
    session_locks: KeyedLocks,
}

impl WalkthroughEngine {
    /// Creates a new `WalkthroughEngine`.
    ///
    /// # Arguments
    ///
    /// * `walkthrough_repository` - Repository for sessions and steps
    /// * `conversation_engine` - Engine step exchanges run through
    /// * `prompt_resolver` - Read-only prompt content store
    pub fn new(
        walkthrough_repository: Arc<dyn WalkthroughRepository>,
        conversation_engine: Arc<ConversationEngine>,
        prompt_resolver: Arc<dyn PromptResolver>,
    ) -> Self {
        Self {
            walkthrough_repository,
            conversation_engine,
            prompt_resolver,
            session_locks: KeyedLocks::new(),
        }
    }

    /// Starts a session: freezes the prompt sequence and records the
    /// caller's opening exchange as step 0.
    ///
    /// # Returns
    ///
    /// - `Ok(WalkthroughSession)`: The persisted session
    /// - `Err(PlumblineError::Config)`: `Selected` kind with no prompt keys
    pub async fn start_session(&self, request: StartSessionRequest) -> Result<WalkthroughSession> {
        let prompt_keys: Vec<String> = match catalog::canonical_sequence(request.analysis_kind) {
            Some(sequence) => sequence.iter().map(|key| (*key).to_string()).collect(),
            None => {
                if request.selected_prompt_keys.is_empty() {
                    return Err(PlumblineError::config(
                        "a selected walkthrough requires at least one prompt key",
                    ));
                }
                request.selected_prompt_keys.clone()
            }
        };

        let session = WalkthroughSession::new(
            request.user_id.clone(),
            request.job_ref.clone(),
            request.analysis_kind,
            prompt_keys,
            request.conversation_id.clone(),
        );
        self.walkthrough_repository.save_session(&session).await?;

        let step = WalkthroughStep::new(
            session.id.clone(),
            0,
            session.prompt_keys[0].clone(),
            request.step_zero_response,
            request.conversation_id,
        );
        self.walkthrough_repository.save_step(&step).await?;

        tracing::info!(
            "[WalkthroughEngine] Started {} walkthrough '{}' with {} steps",
            session.analysis_kind.as_str(),
            session.id,
            session.prompt_keys.len()
        );
        Ok(session)
    }

    /// Advances the session by exactly one step.
    ///
    /// Resolves the next prompt key in the frozen sequence, appends the
    /// value-engineering directive when requested, runs the exchange on the
    /// session's conversation, and persists the new step. Held under the
    /// session lock so concurrent advances cannot both claim the same index.
    ///
    /// # Returns
    ///
    /// - `Ok(WalkthroughStep)`: The newly executed step
    /// - `Err(PlumblineError::WorkflowComplete)`: Every step already ran;
    ///   nothing was executed or persisted
    /// - `Err(PlumblineError::NotFound)` / `Err(PlumblineError::Unauthorized)`:
    ///   Unknown session, or the caller does not own it
    pub async fn next_step(
        &self,
        session_id: &str,
        user_id: &str,
        apply_cost_optimisation: bool,
    ) -> Result<WalkthroughStep> {
        let _guard = self.session_locks.acquire(session_id).await;

        let session = self.load_owned_session(session_id, user_id).await?;
        let steps = self.walkthrough_repository.steps(session_id).await?;
        let next_index = steps.iter().map(|s| s.step_index).max().map_or(0, |i| i + 1);
        if next_index >= session.prompt_keys.len() {
            return Err(PlumblineError::workflow_complete(session_id));
        }

        let prompt_key = session.prompt_keys[next_index].clone();
        let mut prompt = self
            .prompt_resolver
            .get_prompt(namespace::ANALYSIS, &prompt_key)
            .await?;
        if apply_cost_optimisation {
            let directive = self
                .prompt_resolver
                .get_prompt(namespace::SYSTEM, catalog::VALUE_ENGINEERING_KEY)
                .await?;
            prompt.push_str(&directive);
        }

        let outcome = self
            .conversation_engine
            .exchange(ExchangeRequest {
                conversation_id: Some(session.conversation_id.clone()),
                user_id: user_id.to_string(),
                prompt,
                attachments: Vec::new(),
                prompt_tags: Vec::new(),
                is_analysis_turn: true,
            })
            .await?;

        let step = WalkthroughStep::new(
            session.id.clone(),
            next_index,
            prompt_key,
            outcome.text,
            session.conversation_id.clone(),
        );
        self.walkthrough_repository.save_step(&step).await?;

        tracing::info!(
            "[WalkthroughEngine] Session '{}' advanced to step {} of {}",
            session.id,
            next_index,
            session.prompt_keys.len() - 1
        );
        Ok(step)
    }

    /// Reruns a reviewed step in place.
    ///
    /// Builds a revision prompt from the step's original prompt, the
    /// original and reviewer-edited responses, and the reviewer's comments,
    /// then overwrites the step's response at the same index. The step set
    /// of the session is unchanged; only this step's content and
    /// `updated_at` move.
    pub async fn rerun_step(
        &self,
        session_id: &str,
        user_id: &str,
        step_index: usize,
        request: RerunRequest,
    ) -> Result<WalkthroughStep> {
        let _guard = self.session_locks.acquire(session_id).await;

        let session = self.load_owned_session(session_id, user_id).await?;
        let mut step = self
            .walkthrough_repository
            .find_step(session_id, step_index)
            .await?
            .ok_or_else(|| {
                PlumblineError::not_found(
                    "walkthrough step",
                    format!("{session_id}#{step_index}"),
                )
            })?;

        let original_prompt = self
            .prompt_resolver
            .get_prompt(namespace::ANALYSIS, &step.prompt_key)
            .await?;

        let mut sections = vec![
            format!("Original analysis prompt:\n{original_prompt}"),
            format!("Original response:\n{}", request.original_response),
            format!(
                "Reviewer-edited response (authoritative; every change it makes to the \
original must reappear verbatim):\n{}",
                request.edited_response
            ),
        ];
        if let Some(comments) = request.comments.as_deref().filter(|c| !c.trim().is_empty()) {
            sections.push(format!("Reviewer comments to address:\n{comments}"));
        }
        if request.apply_cost_optimisation {
            let directive = self
                .prompt_resolver
                .get_prompt(namespace::SYSTEM, catalog::VALUE_ENGINEERING_KEY)
                .await?;
            sections.push(format!("Additional directive:\n{}", directive.trim_start()));
        }
        sections.push(
            "Produce one complete replacement response to the original analysis prompt. \
Keep the reviewer's edited content verbatim wherever it changed the original, address \
every reviewer comment substantively, and recompute any dependent part of the analysis \
those changes affect. Do not mention this revision process."
                .to_string(),
        );
        let prompt = sections.join("\n\n");

        let outcome = self
            .conversation_engine
            .exchange(ExchangeRequest {
                conversation_id: Some(step.conversation_id.clone()),
                user_id: user_id.to_string(),
                prompt,
                attachments: Vec::new(),
                prompt_tags: Vec::new(),
                is_analysis_turn: true,
            })
            .await?;

        step.response = outcome.text;
        step.edited_response = Some(request.edited_response);
        step.comments = request.comments;
        step.updated_at = Utc::now();
        self.walkthrough_repository.save_step(&step).await?;

        tracing::info!(
            "[WalkthroughEngine] Reran step {} of session '{}'",
            step.step_index,
            session.id
        );
        Ok(step)
    }

    /// Returns the session and its steps, ordered by index.
    pub async fn session_detail(&self, session_id: &str, user_id: &str) -> Result<SessionDetail> {
        let session = self.load_owned_session(session_id, user_id).await?;
        let steps = self.walkthrough_repository.steps(session_id).await?;
        Ok(SessionDetail { session, steps })
    }

    /// Lists the user's sessions, most recently updated first.
    pub async fn sessions_for_user(&self, user_id: &str) -> Result<Vec<WalkthroughSession>> {
        self.walkthrough_repository.list_for_user(user_id).await
    }

    async fn load_owned_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<WalkthroughSession> {
        let session = self
            .walkthrough_repository
            .find_session(session_id)
            .await?
            .ok_or_else(|| PlumblineError::not_found("walkthrough session", session_id))?;
        if session.user_id != user_id {
            return Err(PlumblineError::unauthorized("walkthrough session", session_id));
        }
        Ok(session)
    }
}
