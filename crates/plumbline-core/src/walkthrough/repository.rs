//! Walkthrough repository trait.
//!
//! Defines the interface for walkthrough session and step persistence.

use super::model::{WalkthroughSession, WalkthroughStep};
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for walkthrough sessions and their steps.
///
/// # Implementation Notes
///
/// Implementations should handle:
/// - Step ordering by `step_index`
/// - In-place step replacement for reruns (`save_step` on an existing
///   `(session_id, step_index)` overwrites)
#[async_trait]
pub trait WalkthroughRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(WalkthroughSession))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_session(&self, session_id: &str) -> Result<Option<WalkthroughSession>>;

    /// Saves a session record (insert or full replace).
    async fn save_session(&self, session: &WalkthroughSession) -> Result<()>;

    /// Returns every step of the session, ordered by `step_index`.
    async fn steps(&self, session_id: &str) -> Result<Vec<WalkthroughStep>>;

    /// Finds one step by its position within the session.
    async fn find_step(&self, session_id: &str, step_index: usize) -> Result<Option<WalkthroughStep>>;

    /// Saves a step, inserting or overwriting the `(session_id, step_index)` slot.
    async fn save_step(&self, step: &WalkthroughStep) -> Result<()>;

    /// Lists all sessions owned by `user_id`, most recently updated first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<WalkthroughSession>>;
}
