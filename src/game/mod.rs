//! Game Logic Module
//!
//! Everything about a Boggle game that does not touch a socket.
//!
//! ## Module Structure
//!
//! - `board`: 4x4 letter grid, dice rolls, word-formation check
//! - `dictionary`: word list membership
//! - `player`: per-player score and word sets
//! - `scoring`: word classification and score changes
//! - `summary`: `STOP` lines and session reports

pub mod board;
pub mod dictionary;
pub mod player;
pub mod scoring;
pub mod summary;

// Re-export key types
pub use board::{Board, BoardError, BoardSource};
pub use dictionary::{Dictionary, DictionaryError};
pub use player::{PlayerRecord, Seat};
pub use scoring::{score_word, word_weight, ScoreOutcome};
pub use summary::{render_summary, SessionReport};
