//! Word Scoring
//!
//! Classifies a submitted word as legal, illegal, repeated or duplicated and
//! applies the score change to the two player records.
//!
//! ## Rules
//!
//! - Words of two letters or fewer are ignored outright.
//! - A word is legal if it is in the dictionary and the board can spell it.
//! - A word with a `Q` that is not legal as typed is retried with every `Q`
//!   replaced by `QU`; the replaced form is used from then on.
//! - A player's repeat of their own word does nothing.
//! - A legal word the opponent already attempted (legal or not) is a
//!   duplicate: the opponent loses its weight, and both players get the word
//!   in their duplicate set.

use tracing::debug;

use crate::game::board::Board;
use crate::game::dictionary::Dictionary;
use crate::game::player::{split_pair, PlayerRecord, Seat};

/// Shortest word that counts for anything.
pub const MIN_WORD_LENGTH: usize = 3;

/// Points lost for an illegal word.
pub const ILLEGAL_PENALTY: i32 = 1;

/// Points for a legal word of `len` letters.
#[inline]
pub fn word_weight(len: usize) -> i32 {
    match len {
        0..=2 => 0,
        3 | 4 => 1,
        5 => 2,
        6 => 3,
        7 => 5,
        _ => 11,
    }
}

/// What a submission did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// Too short; nothing recorded.
    Ignored,
    /// Submitter already tried this word.
    Repeated {
        /// Word as classified.
        word: String,
    },
    /// New legal word credited to the submitter.
    Credited {
        /// Word as classified.
        word: String,
        /// Points gained.
        weight: i32,
    },
    /// Legal word the opponent already had; opponent's credit revoked.
    Duplicated {
        /// Word as classified.
        word: String,
        /// Points the opponent lost.
        weight: i32,
    },
    /// Illegal word; submitter penalized.
    Penalized {
        /// Word as classified.
        word: String,
    },
}

impl ScoreOutcome {
    /// Did any score change (and so should scores be broadcast)?
    pub fn changes_score(&self) -> bool {
        matches!(
            self,
            ScoreOutcome::Credited { .. }
                | ScoreOutcome::Duplicated { .. }
                | ScoreOutcome::Penalized { .. }
        )
    }
}

/// Is `word` in the dictionary and formable on the board?
pub fn is_legal(word: &str, dictionary: &Dictionary, board: &Board) -> bool {
    dictionary.contains(word) && board.can_form(word)
}

/// Resolve the form of `word` that scoring should use, and its legality.
pub fn classify(word: &str, dictionary: &Dictionary, board: &Board) -> (String, bool) {
    let word = word.to_ascii_uppercase();
    if is_legal(&word, dictionary, board) {
        return (word, true);
    }

    if word.contains('Q') {
        let expanded = word.replace('Q', "QU");
        let legal = is_legal(&expanded, dictionary, board);
        return (expanded, legal);
    }

    (word, false)
}

/// Score `word` for the player in `seat`.
pub fn score_word(
    word: &str,
    seat: Seat,
    players: &mut [PlayerRecord; 2],
    dictionary: &Dictionary,
    board: &Board,
) -> ScoreOutcome {
    if word.chars().count() < MIN_WORD_LENGTH {
        return ScoreOutcome::Ignored;
    }

    let (word, legal) = classify(word, dictionary, board);
    let (submitter, opponent) = split_pair(players, seat);

    if submitter.has_attempted(&word) {
        return ScoreOutcome::Repeated { word };
    }

    let outcome = if legal {
        let weight = word_weight(word.chars().count());

        if opponent.has_attempted(&word) {
            opponent.legal.remove(&word);
            opponent.score -= weight;
            opponent.duplicate.insert(word.clone());
            submitter.duplicate.insert(word.clone());
            ScoreOutcome::Duplicated { word: word.clone(), weight }
        } else {
            submitter.legal.insert(word.clone());
            submitter.score += weight;
            ScoreOutcome::Credited { word: word.clone(), weight }
        }
    } else {
        submitter.illegal.insert(word.clone());
        submitter.score -= ILLEGAL_PENALTY;
        ScoreOutcome::Penalized { word: word.clone() }
    };

    debug!(player = %submitter.name, ?outcome, "Scored word");
    submitter.attempted.insert(word);

    outcome
}

// =============================================================================
// TESTS
// =============================================================================
