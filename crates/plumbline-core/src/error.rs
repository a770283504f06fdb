//! Error types for the Plumbline orchestration core.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the entire orchestration core.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. Callers branch on the
/// variant (or the `is_*` helpers) instead of matching display strings.
#[derive(Error, Debug, Clone, Serialize)]
pub enum PlumblineError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Caller does not own the referenced entity
    #[error("Access denied: {entity_type} '{id}'")]
    Unauthorized {
        entity_type: &'static str,
        id: String,
    },

    /// Completion gateway failure, with transport-level retryability
    #[error("Gateway error: {message}")]
    Gateway { message: String, retryable: bool },

    /// Terminal condition: the walkthrough has no further steps
    #[error("Walkthrough '{session_id}' is complete; no further steps remain")]
    WorkflowComplete { session_id: String },

    /// Prompt content missing for a (namespace, key) pair
    #[error("Prompt not available: {namespace}/{key}")]
    PromptUnavailable { namespace: String, key: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlumblineError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an Unauthorized error
    pub fn unauthorized(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::Unauthorized {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Gateway error
    pub fn gateway(message: impl Into<String>, retryable: bool) -> Self {
        Self::Gateway {
            message: message.into(),
            retryable,
        }
    }

    /// Creates a WorkflowComplete condition
    pub fn workflow_complete(session_id: impl Into<String>) -> Self {
        Self::WorkflowComplete {
            session_id: session_id.into(),
        }
    }

    /// Creates a PromptUnavailable error
    pub fn prompt_unavailable(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self::PromptUnavailable {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an Unauthorized error
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Check if this is a Gateway error
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway { .. })
    }

    /// Check if this is the WorkflowComplete terminal condition
    pub fn is_workflow_complete(&self) -> bool {
        matches!(self, Self::WorkflowComplete { .. })
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if retrying the same request could plausibly succeed.
    ///
    /// Returns true only for Gateway errors whose underlying cause was
    /// transport-transient (rate limit, timeout, 5xx). NotFound,
    /// Unauthorized, and WorkflowComplete are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway { retryable: true, .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for PlumblineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for PlumblineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for PlumblineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for PlumblineError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<crate::gateway::GatewayError> for PlumblineError {
    fn from(err: crate::gateway::GatewayError) -> Self {
        let retryable = err.is_retryable();
        Self::Gateway {
            message: err.to_string(),
            retryable,
        }
    }
}

impl From<crate::blob::BlobError> for PlumblineError {
    fn from(err: crate::blob::BlobError) -> Self {
        use crate::blob::BlobError;

        match err {
            BlobError::NotFound { reference } => Self::not_found("attachment", reference),
            BlobError::Io { message } => Self::Io { message },
        }
    }
}

/// Conversion from anyhow::Error (infrastructure constructors)
impl From<anyhow::Error> for PlumblineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Conversion from String (for error messages)
impl From<String> for PlumblineError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, PlumblineError>`.
pub type Result<T> = std::result::Result<T, PlumblineError>;
