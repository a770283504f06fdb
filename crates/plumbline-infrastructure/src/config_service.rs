//! Configuration service implementation.
//!
//! Loads the orchestrator configuration from a TOML file
//! (default: ~/.config/plumbline/config.toml) and caches it.

use crate::storage::AtomicTomlFile;
use anyhow::{Context, Result as AnyResult};
use plumbline_core::Result;
use plumbline_core::config::OrchestratorConfig;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the orchestrator config.
///
/// The file is read once and cached; `invalidate_cache` forces a reload.
/// A missing file is created with defaults on first load so operators
/// have something to edit.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_path: PathBuf,
    /// Cached configuration loaded from file.
    /// Uses RwLock for thread-safe lazy loading.
    config: Arc<RwLock<Option<OrchestratorConfig>>>,
}

impl ConfigService {
    /// Creates a service reading from `config_path`.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a service at the default location
    /// (~/.config/plumbline/config.toml).
    pub fn default_location() -> AnyResult<Self> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(Self::new(config_dir.join("plumbline").join("config.toml")))
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// Load failures fall back to defaults so a corrupt config file never
    /// takes the engines down; the failure is logged.
    pub fn get_config(&self) -> OrchestratorConfig {
        {
            let read_lock = self.config.read().unwrap();
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = match self.load_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "[ConfigService] Failed to load {:?}, using defaults: {}",
                    self.config_path,
                    e
                );
                OrchestratorConfig::default()
            }
        };

        {
            let mut write_lock = self.config.write().unwrap();
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap();
        *write_lock = None;
    }

    fn load_config(&self) -> Result<OrchestratorConfig> {
        let file = AtomicTomlFile::<OrchestratorConfig>::new(self.config_path.clone());

        match file.load()? {
            Some(config) => Ok(config),
            None => {
                let default_config = OrchestratorConfig::default();
                file.save(&default_config)?;
                Ok(default_config)
            }
        }
    }
}
