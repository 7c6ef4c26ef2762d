//! Network Layer
//!
//! Line-oriented TCP server, matchmaking and running game sessions.
//! All game rules live in `game/`; this layer moves lines and owns the clock.

pub mod connection;
pub mod matchmaker;
pub mod protocol;
pub mod server;
pub mod session;

pub use connection::{Connection, LineReader, LineWriter};
pub use matchmaker::{GameSettings, JoinOutcome, Matchmaker};
pub use protocol::{GameCommand, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::{GameSession, Participant, SessionId, SessionPhase, SessionState};
