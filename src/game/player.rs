//! Player Records
//!
//! Per-player identity, score and word-classification sets.
//! Uses BTreeSet so summaries list words in a stable order.

use std::collections::BTreeSet;
use serde::Serialize;

// =============================================================================
// SEAT
// =============================================================================

/// One of the two fixed positions in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    /// The player who waited in the slot.
    First,
    /// The player whose join completed the pair.
    Second,
}

impl Seat {
    /// Both seats, in order.
    pub const BOTH: [Seat; 2] = [Seat::First, Seat::Second];

    /// Index into a two-player array.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Seat::First => 0,
            Seat::Second => 1,
        }
    }

    /// The other seat.
    #[inline]
    pub fn opponent(self) -> Seat {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }
}

// =============================================================================
// PLAYER RECORD
// =============================================================================

/// Score and word sets for one player.
///
/// `legal`, `illegal` and `duplicate` only ever hold words that are also in
/// `attempted`; a word is added to `attempted` at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    /// Name from the join line.
    pub name: String,

    /// Current score (may go negative).
    pub score: i32,

    /// Every word longer than two letters this player submitted.
    pub attempted: BTreeSet<String>,

    /// Words currently credited to this player.
    pub legal: BTreeSet<String>,

    /// Words this player was penalized for.
    pub illegal: BTreeSet<String>,

    /// Words nulled out because both players found them.
    pub duplicate: BTreeSet<String>,
}

impl PlayerRecord {
    /// Create a fresh record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Has this player already submitted `word`?
    pub fn has_attempted(&self, word: &str) -> bool {
        self.attempted.contains(word)
    }
}

/// Borrow (submitter, opponent) mutably out of the pair.
pub fn split_pair(
    players: &mut [PlayerRecord; 2],
    seat: Seat,
) -> (&mut PlayerRecord, &mut PlayerRecord) {
    let [first, second] = players;
    match seat {
        Seat::First => (first, second),
        Seat::Second => (second, first),
    }
}
