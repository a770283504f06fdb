//! Prompt content module.
//!
//! Prompt text is addressed by a `(namespace, key)` pair and treated as
//! immutable per deployment: personas, per-step analysis prompts, and the
//! small set of system directives all resolve through one interface.
//!
//! # Module Structure
//!
//! - `catalog`: Built-in prompt content and canonical step sequences
//! - the [`PromptResolver`] trait, implemented by the content store adapters
//!
//! # Usage
//!
//! ```ignore
//! use plumbline_core::prompt::{PromptResolver, namespace};
//! use plumbline_core::prompt::catalog;
//! ```

pub mod catalog;

use crate::error::Result;
use async_trait::async_trait;

/// Well-known prompt namespaces.
pub mod namespace {
    /// System persona texts, keyed by prompt tag.
    pub const PERSONA: &str = "persona";
    /// Per-step analysis prompts, keyed by prompt key.
    pub const ANALYSIS: &str = "analysis";
    /// Orchestrator-internal directives (corrective action, cost optimization).
    pub const SYSTEM: &str = "system";
}

/// An abstract read-only store of prompt content.
///
/// Content is immutable per deployment, so implementations may cache
/// aggressively (populate-on-miss, no invalidation).
#[async_trait]
pub trait PromptResolver: Send + Sync {
    /// Resolves the prompt text stored under `(namespace, key)`.
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The prompt text
    /// - `Err(PlumblineError::PromptUnavailable)`: No content under this pair
    async fn get_prompt(&self, namespace: &str, key: &str) -> Result<String>;
}
