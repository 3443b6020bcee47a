//! # Arbitrage Analytics Common Crate
//!
//! Shared data model and error definitions used across the workspace:
//! tokens, exchange-rate edges, cycles and their fingerprints, and the
//! engine-wide error enum.

/// Module for common error types.
pub mod errors;

/// Module for common data structures and types.
pub mod types;

// Re-export key items for easier access.
pub use errors::EngineError;
pub use types::{Cycle, CycleFingerprint, Edge, HalfLife, Token};
