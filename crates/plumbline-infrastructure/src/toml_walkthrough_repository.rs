//! TOML-based WalkthroughRepository implementation

use crate::storage::AtomicTomlFile;
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::Utc;
use plumbline_core::walkthrough::{WalkthroughRepository, WalkthroughSession, WalkthroughStep};
use plumbline_core::{PlumblineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk document: the session record plus its executed steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalkthroughDoc {
    session: WalkthroughSession,
    #[serde(default)]
    steps: Vec<WalkthroughStep>,
}

/// A repository implementation storing each walkthrough in one TOML file.
///
/// Directory layout:
/// ```text
/// base_dir/
/// └── walkthroughs/
///     ├── <session-id-1>.toml
///     └── <session-id-2>.toml
/// ```
///
/// `save_step` replaces the step occupying the same index, which is what a
/// rerun needs; forward advances insert at the next free index.
pub struct TomlWalkthroughRepository {
    base_dir: PathBuf,
}

impl TomlWalkthroughRepository {
    /// Creates a new repository rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory structure cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> AnyResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        let walkthroughs_dir = base_dir.join("walkthroughs");
        fs::create_dir_all(&walkthroughs_dir).context("Failed to create walkthroughs directory")?;

        Ok(Self { base_dir })
    }

    /// Creates a repository at the default location (~/.plumbline).
    pub fn default_location() -> AnyResult<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Self::new(home_dir.join(".plumbline"))
    }

    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join("walkthroughs")
            .join(format!("{}.toml", session_id))
    }

    fn handle(&self, session_id: &str) -> AtomicTomlFile<WalkthroughDoc> {
        AtomicTomlFile::new(self.session_file_path(session_id))
    }

    fn load_existing(&self, session_id: &str) -> Result<WalkthroughDoc> {
        self.handle(session_id)
            .load()?
            .ok_or_else(|| PlumblineError::not_found("walkthrough session", session_id))
    }
}

#[async_trait]
impl WalkthroughRepository for TomlWalkthroughRepository {
    async fn find_session(&self, session_id: &str) -> Result<Option<WalkthroughSession>> {
        let doc = self.handle(session_id).load()?;
        Ok(doc.map(|d| d.session))
    }

    async fn save_session(&self, session: &WalkthroughSession) -> Result<()> {
        let default_doc = WalkthroughDoc {
            session: session.clone(),
            steps: Vec::new(),
        };
        self.handle(&session.id).update(default_doc, |doc| {
            doc.session = session.clone();
            Ok(())
        })
    }

    async fn steps(&self, session_id: &str) -> Result<Vec<WalkthroughStep>> {
        let mut steps = self.load_existing(session_id)?.steps;
        steps.sort_by_key(|s| s.step_index);
        Ok(steps)
    }

    async fn find_step(
        &self,
        session_id: &str,
        step_index: usize,
    ) -> Result<Option<WalkthroughStep>> {
        let doc = match self.handle(session_id).load()? {
            Some(doc) => doc,
            None => return Ok(None),
        };
        Ok(doc.steps.into_iter().find(|s| s.step_index == step_index))
    }

    async fn save_step(&self, step: &WalkthroughStep) -> Result<()> {
        let current = self.load_existing(&step.session_id)?;
        self.handle(&step.session_id).update(current, |doc| {
            match doc
                .steps
                .iter_mut()
                .find(|s| s.step_index == step.step_index)
            {
                Some(existing) => *existing = step.clone(),
                None => doc.steps.push(step.clone()),
            }
            doc.steps.sort_by_key(|s| s.step_index);
            doc.session.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<WalkthroughSession>> {
        let walkthroughs_dir = self.base_dir.join("walkthroughs");
        let mut sessions = Vec::new();

        for entry in fs::read_dir(&walkthroughs_dir)
            .map_err(|e| PlumblineError::io(format!("failed to read walkthroughs dir: {e}")))?
        {
            let entry = entry.map_err(PlumblineError::from)?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                match AtomicTomlFile::<WalkthroughDoc>::new(path.clone()).load() {
                    Ok(Some(doc)) if doc.session.user_id == user_id => {
                        sessions.push(doc.session);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            "[TomlWalkthroughRepository] Skipping unreadable file {:?}: {}",
                            path,
                            e
                        );
                    }
                }
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(sessions)
    }
}
