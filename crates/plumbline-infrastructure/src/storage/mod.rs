//! Shared storage primitives for the file-backed repositories.

pub mod atomic_toml;

pub use atomic_toml::AtomicTomlFile;
