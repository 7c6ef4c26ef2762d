//! # Boggle Game Server
//!
//! Two-player, timed Boggle over a line-oriented TCP protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BOGGLE SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/              - Deterministic primitives               │
//! │  └── rng.rs         - Xorshift128+ PRNG, board seeds         │
//! │                                                              │
//! │  game/              - Game rules (no I/O)                    │
//! │  ├── board.rs       - 4x4 grid, dice, word formation         │
//! │  ├── dictionary.rs  - Word list                              │
//! │  ├── player.rs      - Seats and player records               │
//! │  ├── scoring.rs     - Word classification and scoring        │
//! │  └── summary.rs     - STOP lines and session reports         │
//! │                                                              │
//! │  network/           - Networking                             │
//! │  ├── connection.rs  - Per-socket line transport              │
//! │  ├── protocol.rs    - Message types                          │
//! │  ├── matchmaker.rs  - Join lines and the waiting slot        │
//! │  ├── session.rs     - Game session state machine             │
//! │  └── server.rs      - TCP accept loop                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! A client sends `PLAY <name>` and waits. When a second player joins, both
//! receive `START <board> <seconds> <opponent>`, then submit `WORD <word>`
//! lines and receive `SCORE <own> <opponent>` after every score change. When
//! the clock runs out each receives a final `SCORE` and a `STOP` summary. If
//! one player disconnects the other receives `TERMINATED`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use game::board::{Board, BoardSource};
pub use game::dictionary::Dictionary;
pub use game::player::{PlayerRecord, Seat};
pub use network::matchmaker::GameSettings;
pub use network::server::{GameServer, GameServerError, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listening port
pub const DEFAULT_PORT: u16 = 2000;
