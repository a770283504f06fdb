//! Walkthrough domain model.
//!
//! A walkthrough is one multi-step analysis pipeline run: a session record
//! pinning the prompt sequence, plus one step record per prompt executed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which canonical prompt sequence a walkthrough follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Full review of a contractor's bid package.
    BidReview,
    /// Line-item scan of a supplier quote.
    QuoteScan,
    /// Caller-supplied prompt sequence; no canonical list applies.
    Selected,
}

impl AnalysisKind {
    /// Stable tag used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BidReview => "bid_review",
            Self::QuoteScan => "quote_scan",
            Self::Selected => "selected",
        }
    }
}

/// One multi-step analysis run.
///
/// The prompt-key sequence is resolved once, at creation, and frozen on
/// the record so later changes to canonical sequences never retroactively
/// alter an in-flight walkthrough. All steps of a session share the single
/// backing conversation recorded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkthroughSession {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// ID of the user who owns this session
    pub user_id: String,
    /// Optional reference to the job this analysis belongs to
    #[serde(default)]
    pub job_ref: Option<String>,
    /// Which canonical sequence this session follows
    pub analysis_kind: AnalysisKind,
    /// The ordered prompt keys, frozen at creation
    pub prompt_keys: Vec<String>,
    /// The conversation all steps of this session run against
    pub conversation_id: String,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
    /// Timestamp when the session was last updated
    pub updated_at: DateTime<Utc>,
}

impl WalkthroughSession {
    /// Creates a new session with its prompt sequence frozen.
    pub fn new(
        user_id: impl Into<String>,
        job_ref: Option<String>,
        analysis_kind: AnalysisKind,
        prompt_keys: Vec<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            job_ref,
            analysis_kind,
            prompt_keys,
            conversation_id: conversation_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bumps the updated timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One executed prompt within a walkthrough session.
///
/// Steps are identified by `(session_id, step_index)`: indices are 0-based,
/// dense, and unique within a session. A step is created once per forward
/// advance; a rerun overwrites `response`, `edited_response`, and
/// `comments` in place without ever changing the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkthroughStep {
    /// ID of the session this step belongs to
    pub session_id: String,
    /// 0-based position within the session's frozen prompt sequence
    pub step_index: usize,
    /// The prompt key executed at this step
    pub prompt_key: String,
    /// The model's response text
    pub response: String,
    /// Human-edited version of the response, if any
    #[serde(default)]
    pub edited_response: Option<String>,
    /// Free-text reviewer comments, if any
    #[serde(default)]
    pub comments: Option<String>,
    /// The conversation the exchange for this step ran against
    pub conversation_id: String,
    /// Timestamp when the step was created
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last write (creation or rerun)
    pub updated_at: DateTime<Utc>,
}

impl WalkthroughStep {
    /// Creates a freshly-advanced step with no human edits yet.
    pub fn new(
        session_id: impl Into<String>,
        step_index: usize,
        prompt_key: impl Into<String>,
        response: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            step_index,
            prompt_key: prompt_key.into(),
            response: response.into(),
            edited_response: None,
            comments: None,
            conversation_id: conversation_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
