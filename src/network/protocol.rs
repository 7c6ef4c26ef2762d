//! Protocol Messages
//!
//! Wire format for client-server communication: one command per
//! newline-terminated text line. Keywords are case-sensitive on the join
//! line; in-game lines are uppercased before matching.
//!
//! The `STOP` summary line is rendered by [`crate::game::summary`].

use std::fmt;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Join keyword, followed by a space and the player name.
pub const JOIN_KEYWORD: &str = "PLAY ";

/// In-game word keyword, followed by a space and the word.
pub const WORD_KEYWORD: &str = "WORD ";

/// Parse a join line (`PLAY <name>`), returning the name.
///
/// Surrounding whitespace is ignored; the keyword is case-sensitive.
pub fn parse_join(line: &str) -> Option<&str> {
    let name = line.trim().strip_prefix(JOIN_KEYWORD)?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// A line received during play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
    /// `WORD <word>`, with the word uppercased.
    Word(String),
    /// Anything else, normalized (trimmed, uppercased).
    Unrecognized(String),
}

impl GameCommand {
    /// Normalize and classify an in-game line.
    pub fn parse(line: &str) -> Self {
        let normalized = line.trim().to_uppercase();
        match normalized.strip_prefix(WORD_KEYWORD) {
            Some(word) => GameCommand::Word(word.trim().to_string()),
            None => GameCommand::Unrecognized(normalized),
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Line did not fit the current state.
    Ignoring(String),

    /// Game is starting.
    Start {
        /// Board letters, row-major.
        board: String,
        /// Game length in seconds.
        seconds: u32,
        /// Opponent's name.
        opponent: String,
    },

    /// Current scores, receiver's first.
    Score {
        /// Receiver's score.
        own: i32,
        /// Opponent's score.
        opponent: i32,
    },

    /// Opponent disconnected; game over.
    Terminated,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Ignoring(line) => write!(f, "IGNORING {}", line),
            ServerMessage::Start { board, seconds, opponent } => {
                write!(f, "START {} {} {}", board, seconds, opponent)
            }
            ServerMessage::Score { own, opponent } => write!(f, "SCORE {} {}", own, opponent),
            ServerMessage::Terminated => f.write_str("TERMINATED"),
        }
    }
}

impl From<ServerMessage> for String {
    fn from(msg: ServerMessage) -> Self {
        msg.to_string()
    }
}
