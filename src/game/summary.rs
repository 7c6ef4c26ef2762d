//! End-of-game summaries.
//!
//! `STOP` lines for the wire, and a JSON-serializable report for the logs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::game::board::Board;
use crate::game::player::PlayerRecord;

/// `<count> <words...>` for one set. An empty set leaves an empty word list.
fn word_group(words: &BTreeSet<String>) -> String {
    let joined: Vec<&str> = words.iter().map(String::as_str).collect();
    format!("{} {}", words.len(), joined.join(" "))
}

/// Render the `STOP` line for `own`, with `opponent`'s data second.
///
/// Field order: own legal, opponent legal, duplicates, own illegal,
/// opponent illegal.
pub fn render_summary(own: &PlayerRecord, opponent: &PlayerRecord) -> String {
    let groups = [
        word_group(&own.legal),
        word_group(&opponent.legal),
        word_group(&own.duplicate),
        word_group(&own.illegal),
        word_group(&opponent.illegal),
    ];
    format!("STOP {}", groups.join(" "))
}

/// Record of a finished session, emitted as a structured log event.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Session UUID.
    pub session_id: String,
    /// Board played on.
    pub board: Board,
    /// Game length in seconds.
    pub duration_secs: u32,
    /// When play began.
    pub started_at: DateTime<Utc>,
    /// Both players, seat order.
    pub players: [PlayerRecord; 2],
}

impl SessionReport {
    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
