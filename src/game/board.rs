//! Letter Grid
//!
//! The 4x4 Boggle board and its word-formation check.
//!
//! A `Q` cell stands for the two letters `QU`, as on a physical die.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::core::rng::DeterministicRng;

/// Board side length.
pub const BOARD_SIZE: usize = 4;

/// Number of cells on a board.
pub const BOARD_CELLS: usize = BOARD_SIZE * BOARD_SIZE;

/// The sixteen standard Boggle dice, one string of faces per die.
pub const DICE: [&str; BOARD_CELLS] = [
    "LRYTTE", "ANAEEG", "AFPKFS", "YLDEVR",
    "VTHRWE", "IDSYTT", "XLDERI", "ZNRNHL",
    "EGHWNE", "OATTOW", "HCPOAS", "NMIQHU",
    "SEOTIS", "MTOICU", "ENSIEU", "OBBAOJ",
];

/// Board parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Board string has the wrong number of letters.
    #[error("board must have exactly 16 letters, got {0}")]
    WrongLength(usize),

    /// Board string contains something other than an ASCII letter.
    #[error("board contains non-letter character {0:?}")]
    NonLetter(char),
}

/// A 4x4 grid of uppercase letters, stored row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    cells: [char; BOARD_CELLS],
}

impl Board {
    /// Roll the dice: shuffle their positions and pick one face per die.
    pub fn random(rng: &mut DeterministicRng) -> Self {
        let mut dice = DICE;
        rng.shuffle(&mut dice);

        let mut cells = ['A'; BOARD_CELLS];
        for (cell, die) in cells.iter_mut().zip(dice.iter()) {
            let faces: Vec<char> = die.chars().collect();
            if let Some(face) = rng.choose(&faces) {
                *cell = *face;
            }
        }

        Self { cells }
    }

    /// The board's letters, row-major, as sent in `START`.
    pub fn letters(&self) -> String {
        self.cells.iter().collect()
    }

    /// Letter at (row, col).
    pub fn letter_at(&self, row: usize, col: usize) -> Option<char> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(self.cells[row * BOARD_SIZE + col])
        } else {
            None
        }
    }

    /// Can `word` be spelled by a path of adjacent cells, using each cell at most once?
    ///
    /// Adjacency includes diagonals. A `Q` cell only matches `QU` in the word.
    pub fn can_form(&self, word: &str) -> bool {
        let word: Vec<char> = word.chars().map(|c| c.to_ascii_uppercase()).collect();
        if word.is_empty() {
            return false;
        }

        let mut visited = [false; BOARD_CELLS];
        (0..BOARD_CELLS).any(|cell| self.search(&word, cell, &mut visited))
    }

    fn search(&self, rest: &[char], cell: usize, visited: &mut [bool; BOARD_CELLS]) -> bool {
        let consumed = match match_cell(self.cells[cell], rest) {
            Some(n) => n,
            None => return false,
        };

        let rest = &rest[consumed..];
        if rest.is_empty() {
            return true;
        }

        visited[cell] = true;
        let found = neighbors(cell).any(|next| !visited[next] && self.search(rest, next, visited));
        visited[cell] = false;

        found
    }
}

/// Number of word letters a cell consumes, if it matches the front of `rest`.
fn match_cell(letter: char, rest: &[char]) -> Option<usize> {
    if *rest.first()? != letter {
        return None;
    }
    if letter == 'Q' {
        (rest.get(1) == Some(&'U')).then_some(2)
    } else {
        Some(1)
    }
}

/// Cells adjacent to `cell`, diagonals included.
fn neighbors(cell: usize) -> impl Iterator<Item = usize> {
    let row = (cell / BOARD_SIZE) as isize;
    let col = (cell % BOARD_SIZE) as isize;
    let size = BOARD_SIZE as isize;

    (-1..=1isize)
        .flat_map(move |dr| (-1..=1isize).map(move |dc| (row + dr, col + dc)))
        .filter(move |&(r, c)| {
            (r, c) != (row, col) && (0..size).contains(&r) && (0..size).contains(&c)
        })
        .map(move |(r, c)| (r * size + c) as usize)
}

/// Where each session's board comes from.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum BoardSource {
    /// Every session plays this board.
    Fixed(Board),
    /// Each session rolls the dice.
    #[default]
    Random,
}

impl BoardSource {
    /// Board for a new session.
    pub fn board_for(&self, session_id: &[u8; 16], player_names: &[&str]) -> Board {
        match self {
            BoardSource::Fixed(board) => board.clone(),
            BoardSource::Random => {
                Board::random(&mut DeterministicRng::for_session(session_id, player_names))
            }
        }
    }
}

impl FromStr for Board {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let letters: Vec<char> = s.trim().chars().collect();
        if letters.len() != BOARD_CELLS {
            return Err(BoardError::WrongLength(letters.len()));
        }

        let mut cells = ['A'; BOARD_CELLS];
        for (cell, c) in cells.iter_mut().zip(letters) {
            if !c.is_ascii_alphabetic() {
                return Err(BoardError::NonLetter(c));
            }
            *cell = c.to_ascii_uppercase();
        }

        Ok(Self { cells })
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.letters())
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.letters())
    }
}

// =============================================================================
// TESTS
// =============================================================================
