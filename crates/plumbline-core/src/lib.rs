//! Core domain of the Plumbline analysis orchestration engine.
//!
//! This crate defines the domain models (conversations, messages,
//! walkthrough sessions and steps), the contracts the orchestration
//! engines depend on (completion gateway, blob store, prompt resolver,
//! repositories), the shared error taxonomy, and the built-in prompt
//! catalog. It contains no IO of its own; adapters live in the
//! `plumbline-gateway` and `plumbline-infrastructure` crates and the
//! engines in `plumbline-engine`.

pub mod blob;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod prompt;
pub mod walkthrough;

// Re-export common error type
pub use error::{PlumblineError, Result};
