//! Filesystem-backed BlobStore implementation.
//!
//! Resolves document references as paths relative to a fixed root
//! directory. MIME types are guessed from the file extension.

use async_trait::async_trait;
use plumbline_core::blob::{BlobError, BlobObject, BlobStore};
use std::path::{Component, Path, PathBuf};

const FALLBACK_MIME: &str = "application/octet-stream";

/// Blob store serving files from a local directory tree.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates a store rooted at `root`. References resolve relative to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a reference to a path under the root.
    ///
    /// References must stay inside the root: absolute paths and `..`
    /// components are rejected as not-found rather than escaping the tree.
    fn reference_path(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn resolve(&self, reference: &str) -> Result<BlobObject, BlobError> {
        let path = self
            .reference_path(reference)
            .ok_or_else(|| BlobError::NotFound {
                reference: reference.to_string(),
            })?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobError::NotFound {
                    reference: reference.to_string(),
                }
            } else {
                BlobError::Io {
                    message: format!("failed to read {}: {e}", path.display()),
                }
            }
        })?;

        let mime_type = mime_guess::from_path(&path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        Ok(BlobObject { bytes, mime_type })
    }
}
