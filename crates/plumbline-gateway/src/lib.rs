//! Completion gateway adapters for the Plumbline orchestration engine.
//!
//! Each adapter implements [`plumbline_core::gateway::CompletionGateway`]
//! against one provider's wire format. The engines never see provider
//! details; they submit ordered turns and receive text.

pub mod gemini;

pub use gemini::GeminiGateway;
