//! Conversation domain module.
//!
//! This module contains the conversation-related domain models and the
//! repository interface for persisting them.
//!
//! # Module Structure
//!
//! - `model`: Core conversation domain models (`Conversation`, `ConversationMessage`, `MessageRole`)
//! - `repository`: Repository trait for conversation persistence
//!
//! # Usage
//!
//! ```ignore
//! use plumbline_core::conversation::{Conversation, ConversationMessage, MessageRole};
//! use plumbline_core::conversation::ConversationRepository;
//! ```

mod model;
mod repository;

// Re-export public API
pub use model::{Conversation, ConversationMessage, MessageRole};
pub use repository::ConversationRepository;
