//! Storage and content adapters for the Plumbline orchestration engine.
//!
//! File-backed repositories (one TOML document per record, written
//! atomically), in-memory repositories for embedded use and tests, a
//! filesystem blob store, prompt resolvers, and the configuration
//! service.

pub mod config_service;
pub mod fs_blob_store;
pub mod memory_store;
pub mod prompt_resolver;
pub mod storage;
pub mod toml_conversation_repository;
pub mod toml_walkthrough_repository;

pub use crate::config_service::ConfigService;
pub use crate::fs_blob_store::FsBlobStore;
pub use crate::memory_store::{InMemoryConversationRepository, InMemoryWalkthroughRepository};
pub use crate::prompt_resolver::{CachedPromptResolver, PresetPromptResolver};
pub use crate::toml_conversation_repository::TomlConversationRepository;
pub use crate::toml_walkthrough_repository::TomlWalkthroughRepository;
