//! File registry.
//!
//! Tracks every file the user registered: its decomposed path, logical type,
//! allowed outputs, chosen target and conversion status.

mod store;
mod types;

pub use store::FileRegistry;
pub use types::*;
