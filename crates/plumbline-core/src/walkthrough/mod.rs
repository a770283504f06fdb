//! Walkthrough domain module.
//!
//! This module contains the walkthrough (multi-step analysis) domain
//! models and the repository interface for persisting them.
//!
//! # Module Structure
//!
//! - `model`: Core walkthrough domain models (`WalkthroughSession`, `WalkthroughStep`, `AnalysisKind`)
//! - `repository`: Repository trait for walkthrough persistence
//!
//! # Usage
//!
//! ```ignore
//! use plumbline_core::walkthrough::{AnalysisKind, WalkthroughSession, WalkthroughStep};
//! use plumbline_core::walkthrough::WalkthroughRepository;
//! ```

mod model;
mod repository;

// Re-export public API
pub use model::{AnalysisKind, WalkthroughSession, WalkthroughStep};
pub use repository::WalkthroughRepository;
