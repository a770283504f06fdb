//! Blob store contract.
//!
//! Uploaded documents live in an external blob store; the orchestration
//! core only ever resolves an opaque reference to raw bytes plus a MIME
//! type so the bytes can be inlined into a completion turn.

use async_trait::async_trait;
use thiserror::Error;

/// A resolved blob: raw bytes and the MIME type to present them under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Failure contract of a blob store.
#[derive(Error, Debug, Clone)]
pub enum BlobError {
    /// No blob exists under the given reference.
    #[error("blob not found: '{reference}'")]
    NotFound { reference: String },

    /// Underlying storage failed while reading the blob.
    #[error("blob store IO error: {message}")]
    Io { message: String },
}

/// An abstract store resolving document references to raw content.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Resolves a document reference to its bytes and MIME type.
    ///
    /// # Returns
    ///
    /// - `Ok(BlobObject)`: The blob's content and MIME type
    /// - `Err(BlobError::NotFound)`: No blob under this reference
    /// - `Err(BlobError::Io)`: Transient or permanent read failure
    async fn resolve(&self, reference: &str) -> std::result::Result<BlobObject, BlobError>;
}
