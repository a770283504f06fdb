//! Prompt resolver implementations.
//!
//! `PresetPromptResolver` serves the compiled-in catalog;
//! `CachedPromptResolver` wraps any resolver with a process-wide
//! read-through cache. Prompt content is immutable per deployment, so the
//! cache never invalidates.

use async_trait::async_trait;
use plumbline_core::prompt::{PromptResolver, catalog};
use plumbline_core::{PlumblineError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Resolver backed by the built-in prompt catalog.
#[derive(Default)]
pub struct PresetPromptResolver;

impl PresetPromptResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PromptResolver for PresetPromptResolver {
    async fn get_prompt(&self, namespace: &str, key: &str) -> Result<String> {
        catalog::preset_prompt(namespace, key)
            .map(|text| text.to_string())
            .ok_or_else(|| PlumblineError::prompt_unavailable(namespace, key))
    }
}

/// Read-through cache over another resolver.
///
/// The first successful lookup of a `(namespace, key)` pair is cached for
/// the life of the process. Misses are not cached: a deployment gap in
/// the underlying store should surface every time rather than pin an
/// error.
pub struct CachedPromptResolver {
    inner: Arc<dyn PromptResolver>,
    cache: RwLock<HashMap<(String, String), String>>,
}

impl CachedPromptResolver {
    pub fn new(inner: Arc<dyn PromptResolver>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PromptResolver for CachedPromptResolver {
    async fn get_prompt(&self, namespace: &str, key: &str) -> Result<String> {
        let cache_key = (namespace.to_string(), key.to_string());

        {
            let read_lock = self.cache.read().unwrap();
            if let Some(cached) = read_lock.get(&cache_key) {
                return Ok(cached.clone());
            }
        }

        let resolved = self.inner.get_prompt(namespace, key).await?;

        {
            let mut write_lock = self.cache.write().unwrap();
            write_lock.insert(cache_key, resolved.clone());
        }

        Ok(resolved)
    }
}
