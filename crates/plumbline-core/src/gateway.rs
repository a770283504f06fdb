//! Completion gateway contract.
//!
//! This module defines the turn structures submitted to the external
//! completion service and the trait every gateway adapter implements.
//! The orchestration engines only ever see this contract; transport,
//! wire format, and provider-side retry policy live behind it.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// The role of a single conversation turn on the completion wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    /// Turn authored by the human (or by the orchestrator on their behalf).
    User,
    /// Turn authored by the model.
    Model,
}

/// Binary content embedded inline in a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAttachment {
    /// MIME type of the payload (e.g. "application/pdf").
    pub mime_type: String,
    /// Raw bytes, encoded by the gateway adapter as its wire requires.
    pub data: Vec<u8>,
}

/// One ordered turn in a completion request.
///
/// A turn carries one or more text parts plus optional inline attachments.
/// Adapters decide how parts map onto their provider's request shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text_parts: Vec<String>,
    pub attachments: Vec<InlineAttachment>,
}

impl Turn {
    /// Creates a user turn with a single text part and no attachments.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text_parts: vec![text.into()],
            attachments: Vec::new(),
        }
    }

    /// Creates a model turn with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text_parts: vec![text.into()],
            attachments: Vec::new(),
        }
    }

    /// Attaches inline binary content to this turn.
    pub fn with_attachments(mut self, attachments: Vec<InlineAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Concatenated text content of this turn (attachments excluded).
    pub fn text(&self) -> String {
        self.text_parts.join("\n")
    }
}

/// Failure contract of a completion gateway.
///
/// Adapters map provider responses onto these variants so that callers can
/// distinguish transport-transient failures (worth surfacing as retryable)
/// from permanent ones without inspecting provider-specific payloads.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Provider rejected the request for quota/rate reasons.
    #[error("rate limited by completion service{}", retry_after_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// The call exceeded its deadline.
    #[error("completion request timed out")]
    Timeout,

    /// Provider refused to generate for content-policy reasons.
    #[error("completion blocked by content policy: {message}")]
    ContentPolicy { message: String },

    /// Non-success HTTP status from the provider.
    #[error("completion service returned HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retryable: bool,
    },

    /// Transport-level failure before any HTTP status was received.
    #[error("network error talking to completion service: {message}")]
    Network { message: String },

    /// Response body did not match the expected shape.
    #[error("malformed completion response: {message}")]
    Malformed { message: String },

    /// The request could not be built (e.g., a turn with no content).
    #[error("invalid completion request: {message}")]
    InvalidRequest { message: String },
}

fn retry_after_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl GatewayError {
    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Timeout => true,
            Self::ContentPolicy { .. } => false,
            Self::Http { retryable, .. } => *retryable,
            Self::Network { .. } => true,
            Self::Malformed { .. } => false,
            Self::InvalidRequest { .. } => false,
        }
    }
}

/// An abstract gateway to the external completion service.
///
/// Implementations submit the ordered turn list and return the generated
/// text. Retry/backoff policy, if any, belongs to the implementation; the
/// orchestration engines never retry transport failures themselves.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Submits the assembled turns and returns the generated text.
    ///
    /// # Arguments
    ///
    /// * `turns` - Ordered conversation turns, oldest first
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The generated response text
    /// - `Err(GatewayError)`: Typed failure per the contract above
    async fn complete(&self, turns: &[Turn]) -> std::result::Result<String, GatewayError>;
}
