//! Word list loaded once at startup.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Dictionary load errors.
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// File could not be read.
    #[error("failed to read dictionary {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File had no words in it.
    #[error("dictionary {0} contains no words")]
    Empty(PathBuf),
}

/// Set of legal words, stored uppercase.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    /// Load a word list with one word per line.
    ///
    /// Lines are trimmed and uppercased; blank lines are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let dictionary = Self::from_words(text.lines());
        if dictionary.is_empty() {
            return Err(DictionaryError::Empty(path.to_path_buf()));
        }

        info!("Loaded {} words from {}", dictionary.len(), path.display());
        Ok(dictionary)
    }

    /// Build a dictionary from an iterator of words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_ascii_uppercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Is `word` in the list? Expects an uppercase word.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True if no words were loaded.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
