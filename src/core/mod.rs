//! Core primitives.
//!
//! Deterministic randomness used to roll boards.

pub mod rng;

// Re-export core types
pub use rng::{derive_board_seed, DeterministicRng};
