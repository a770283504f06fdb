//! Orchestration engines for Plumbline.
//!
//! This crate coordinates the domain and adapter layers into the two
//! entry points the backend exposes: single conversational exchanges
//! (`ConversationEngine`) and multi-step analysis walkthroughs
//! (`WalkthroughEngine`).

pub mod compactor;
pub mod conversation_engine;
pub mod failure;
pub mod locks;
pub mod walkthrough_engine;

pub use compactor::ContextCompactor;
pub use conversation_engine::{ConversationEngine, ExchangeOutcome, ExchangeRequest};
pub use failure::{FailureDetector, TaggedCompletion};
pub use locks::KeyedLocks;
pub use walkthrough_engine::{
    RerunRequest, SessionDetail, StartSessionRequest, WalkthroughEngine,
};
