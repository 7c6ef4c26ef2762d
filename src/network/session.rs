//! Game Session Management
//!
//! One timed two-player game, from `START` to `STOP`.
//!
//! ## Locking
//!
//! All session state lives behind one `tokio::sync::Mutex`. Both players'
//! read loops and the countdown take that lock, so words from the two
//! players are scored one at a time, and the countdown's finish decision and
//! teardown happen in the same critical section as word processing. A word
//! that arrives after the finish is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::game::board::Board;
use crate::game::dictionary::Dictionary;
use crate::game::player::{PlayerRecord, Seat};
use crate::game::scoring::score_word;
use crate::game::summary::{render_summary, SessionReport};
use crate::network::connection::{Connection, LineReader, LineWriter};
use crate::network::matchmaker::GameSettings;
use crate::network::protocol::{GameCommand, ServerMessage};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Paired, `START` not yet sent.
    Created,
    /// Countdown running, words accepted.
    Running,
    /// Countdown reached zero; summaries sent.
    Finished,
    /// A player disconnected mid-game.
    Terminated,
}

impl SessionPhase {
    /// No more lines will be processed.
    pub fn is_over(self) -> bool {
        matches!(self, SessionPhase::Finished | SessionPhase::Terminated)
    }
}

/// What a read loop should do after handling a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadControl {
    /// Read the next line.
    Continue,
    /// Stop reading from this player.
    Stop,
}

/// A joined player and its connection.
#[derive(Debug)]
pub struct Participant {
    /// Score and word sets.
    pub record: PlayerRecord,
    /// Client connection.
    pub connection: Connection,
}

impl Participant {
    /// Create a participant with a fresh record.
    pub fn new(name: impl Into<String>, connection: Connection) -> Self {
        Self {
            record: PlayerRecord::new(name),
            connection,
        }
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Everything guarded by the session lock.
#[derive(Debug)]
pub struct SessionState {
    id: SessionId,
    phase: SessionPhase,
    players: [PlayerRecord; 2],
    writers: [LineWriter; 2],
    board: Board,
    dictionary: Arc<Dictionary>,
    duration_secs: u32,
    remaining_secs: u32,
    started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Create a session in the `Created` phase.
    pub fn new(
        id: SessionId,
        players: [PlayerRecord; 2],
        writers: [LineWriter; 2],
        board: Board,
        dictionary: Arc<Dictionary>,
        duration_secs: u32,
    ) -> Self {
        Self {
            id,
            phase: SessionPhase::Created,
            players,
            writers,
            board,
            dictionary,
            duration_secs,
            remaining_secs: duration_secs,
            started_at: None,
        }
    }

    /// Send `START` to both players and begin accepting words.
    pub fn start(&mut self) {
        if self.phase != SessionPhase::Created {
            return;
        }

        let letters = self.board.letters();
        for seat in Seat::BOTH {
            let opponent = &self.players[seat.opponent().index()];
            self.send(seat, ServerMessage::Start {
                board: letters.clone(),
                seconds: self.duration_secs,
                opponent: opponent.name.clone(),
            });
        }

        self.phase = SessionPhase::Running;
        self.started_at = Some(Utc::now());
        info!(
            "Session {} started: {} vs {} on {}",
            short_id(&self.id), self.players[0].name, self.players[1].name, letters
        );
    }

    /// Handle one read result from the player in `seat`.
    ///
    /// `None` means the player disconnected.
    pub fn handle_line(&mut self, seat: Seat, line: Option<String>) -> ReadControl {
        if self.phase.is_over() {
            return ReadControl::Stop;
        }

        let line = match line {
            Some(line) => line,
            None => {
                self.terminate(seat);
                return ReadControl::Stop;
            }
        };

        match GameCommand::parse(&line) {
            GameCommand::Word(word) => {
                let outcome =
                    score_word(&word, seat, &mut self.players, &self.dictionary, &self.board);
                if outcome.changes_score() {
                    self.broadcast_scores();
                }
            }
            GameCommand::Unrecognized(normalized) => {
                debug!("Ignoring {:?} from {}", normalized, self.players[seat.index()].name);
                self.send(seat, ServerMessage::Ignoring(normalized));
            }
        }

        ReadControl::Continue
    }

    /// Advance the countdown by one second. Returns the report if this tick ended the game.
    pub fn tick(&mut self) -> Option<SessionReport> {
        if self.phase != SessionPhase::Running {
            return None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.finish()
        } else {
            None
        }
    }

    /// End the game: final scores, summaries, close both connections.
    pub fn finish(&mut self) -> Option<SessionReport> {
        if self.phase != SessionPhase::Running {
            return None;
        }
        self.phase = SessionPhase::Finished;

        self.broadcast_scores();
        for seat in Seat::BOTH {
            let summary = render_summary(
                &self.players[seat.index()],
                &self.players[seat.opponent().index()],
            );
            self.writers[seat.index()].send_line(summary);
        }
        for writer in &self.writers {
            writer.close();
        }

        info!(
            "Session {} finished: {} {} - {} {}",
            short_id(&self.id),
            self.players[0].name, self.players[0].score,
            self.players[1].name, self.players[1].score,
        );
        Some(self.report())
    }

    /// The player in `seat` disconnected: notify and drop the other player.
    fn terminate(&mut self, seat: Seat) {
        let survivor = seat.opponent();
        self.send(survivor, ServerMessage::Terminated);
        self.writers[survivor.index()].close();
        self.writers[seat.index()].close();
        self.phase = SessionPhase::Terminated;

        info!(
            "Session {} terminated: {} disconnected",
            short_id(&self.id), self.players[seat.index()].name
        );
    }

    /// Send `SCORE <own> <opponent>` to each player.
    fn broadcast_scores(&self) {
        for seat in Seat::BOTH {
            self.send(seat, ServerMessage::Score {
                own: self.players[seat.index()].score,
                opponent: self.players[seat.opponent().index()].score,
            });
        }
    }

    fn send(&self, seat: Seat, message: ServerMessage) {
        if !self.writers[seat.index()].send_line(message) {
            debug!("Dropped message for {}: connection gone", self.players[seat.index()].name);
        }
    }

    /// Build a report of the session as it stands.
    pub fn report(&self) -> SessionReport {
        SessionReport {
            session_id: uuid::Uuid::from_bytes(self.id).to_string(),
            board: self.board.clone(),
            duration_secs: self.duration_secs,
            started_at: self.started_at.unwrap_or_else(Utc::now),
            players: self.players.clone(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Player record for `seat`.
    pub fn player(&self, seat: Seat) -> &PlayerRecord {
        &self.players[seat.index()]
    }

    /// Seconds left on the clock.
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }
}

fn short_id(id: &SessionId) -> String {
    hex::encode(&id[..4])
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// A paired game, ready to run on its own task.
pub struct GameSession {
    id: SessionId,
    names: [String; 2],
    state: Arc<Mutex<SessionState>>,
    readers: [LineReader; 2],
}

impl GameSession {
    /// Pair two participants. `first` is the player who was waiting.
    pub fn new(first: Participant, second: Participant, settings: &GameSettings) -> Self {
        let id = uuid::Uuid::new_v4().into_bytes();
        let board = settings
            .board
            .board_for(&id, &[first.record.name.as_str(), second.record.name.as_str()]);

        let names = [first.record.name.clone(), second.record.name.clone()];

        let Connection { writer: first_writer, reader: first_reader } = first.connection;
        let Connection { writer: second_writer, reader: second_reader } = second.connection;

        let state = SessionState::new(
            id,
            [first.record, second.record],
            [first_writer, second_writer],
            board,
            settings.dictionary.clone(),
            settings.duration_secs,
        );

        Self {
            id,
            names,
            state: Arc::new(Mutex::new(state)),
            readers: [first_reader, second_reader],
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Player names, seat order.
    pub fn player_names(&self) -> [&str; 2] {
        [&self.names[0], &self.names[1]]
    }

    /// Shared handle to the session state.
    pub fn state(&self) -> Arc<Mutex<SessionState>> {
        self.state.clone()
    }

    /// Run the game to completion.
    ///
    /// Sends `START`, then waits on the countdown while both read loops
    /// process lines. Returns once the game has finished or been terminated.
    #[instrument(skip(self), fields(session = %short_id(&self.id)))]
    pub async fn run(self) {
        let GameSession { state, readers, .. } = self;
        let [first_reader, second_reader] = readers;

        state.lock().await.start();

        let countdown = tokio::spawn(run_countdown(state.clone()));
        let read_loops: [JoinHandle<()>; 2] = [
            tokio::spawn(run_read_loop(state.clone(), Seat::First, first_reader)),
            tokio::spawn(run_read_loop(state.clone(), Seat::Second, second_reader)),
        ];

        match countdown.await {
            Ok(Some(report)) => match report.to_json() {
                Ok(json) => info!(report = %json, "Session report"),
                Err(e) => error!("Failed to serialize session report: {}", e),
            },
            Ok(None) => {}
            Err(e) => error!("Countdown task failed: {}", e),
        }

        for handle in read_loops {
            handle.abort();
        }
        debug!("Session task finished");
    }
}

/// Tick once per second until the game finishes or is terminated.
async fn run_countdown(state: Arc<Mutex<SessionState>>) -> Option<SessionReport> {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let mut session = state.lock().await;
        if session.phase() != SessionPhase::Running {
            return None;
        }
        if let Some(report) = session.tick() {
            return Some(report);
        }
    }
}

/// Feed one player's lines into the session until told to stop.
async fn run_read_loop(state: Arc<Mutex<SessionState>>, seat: Seat, mut reader: LineReader) {
    loop {
        let line = reader.read_line().await;

        let mut session = state.lock().await;
        if session.handle_line(seat, line) == ReadControl::Stop {
            return;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::BoardSource;
    use crate::network::connection::{Outbound, RemotePeer};

    const BOARD: &str = "QDDEATSDCIESKYTI";

    fn settings(duration_secs: u32) -> GameSettings {
        GameSettings {
            duration_secs,
            board: BoardSource::Fixed(BOARD.parse().unwrap()),
            dictionary: Arc::new(Dictionary::from_words(["CAT", "TIE", "TIES", "SITE"])),
        }
    }

    fn pair(duration_secs: u32) -> (GameSession, RemotePeer, RemotePeer) {
        let (conn_a, peer_a) = Connection::in_memory("alice");
        let (conn_b, peer_b) = Connection::in_memory("bob");
        let session = GameSession::new(
            Participant::new("alice", conn_a),
            Participant::new("bob", conn_b),
            &settings(duration_secs),
        );
        (session, peer_a, peer_b)
    }

    /// A started session driven by hand, without the countdown or read loops.
    async fn started_state(
        duration_secs: u32,
    ) -> (Arc<Mutex<SessionState>>, RemotePeer, RemotePeer) {
        let (session, mut peer_a, mut peer_b) = pair(duration_secs);
        let state = session.state();
        state.lock().await.start();
        assert!(peer_a.recv().await.unwrap().starts_with("START"));
        assert!(peer_b.recv().await.unwrap().starts_with("START"));
        (state, peer_a, peer_b)
    }

    #[tokio::test]
    async fn test_start_message() {
        let (session, mut peer_a, mut peer_b) = pair(60);
        let state = session.state();
        assert_eq!(state.lock().await.phase(), SessionPhase::Created);

        state.lock().await.start();

        assert_eq!(peer_a.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 60 bob"));
        assert_eq!(peer_b.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 60 alice"));
        assert_eq!(state.lock().await.phase(), SessionPhase::Running);
    }

    #[tokio::test]
    async fn test_word_broadcasts_scores() {
        let (state, mut peer_a, mut peer_b) = started_state(60).await;

        let control = state.lock().await.handle_line(Seat::First, Some("WORD cat".into()));

        assert_eq!(control, ReadControl::Continue);
        assert_eq!(peer_a.recv().await.as_deref(), Some("SCORE 1 0"));
        assert_eq!(peer_b.recv().await.as_deref(), Some("SCORE 0 1"));
    }

    #[tokio::test]
    async fn test_short_and_repeated_words_are_silent() {
        let (state, mut peer_a, mut peer_b) = started_state(60).await;

        {
            let mut s = state.lock().await;
            s.handle_line(Seat::First, Some("WORD at".into()));
            s.handle_line(Seat::First, Some("WORD cat".into()));
            s.handle_line(Seat::First, Some("WORD cat".into()));
        }

        assert_eq!(peer_a.recv().await.as_deref(), Some("SCORE 1 0"));
        assert_eq!(peer_b.recv().await.as_deref(), Some("SCORE 0 1"));
        assert!(peer_a.try_recv().is_none());
        assert!(peer_b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unrecognized_line_is_ignored() {
        let (state, mut peer_a, mut peer_b) = started_state(60).await;

        state.lock().await.handle_line(Seat::Second, Some("  hello there ".into()));

        assert_eq!(peer_b.recv().await.as_deref(), Some("IGNORING HELLO THERE"));
        assert!(peer_a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_terminates_session() {
        let (state, mut peer_a, mut peer_b) = started_state(60).await;

        let control = state.lock().await.handle_line(Seat::Second, None);

        assert_eq!(control, ReadControl::Stop);
        assert_eq!(state.lock().await.phase(), SessionPhase::Terminated);
        assert_eq!(peer_a.recv().await.as_deref(), Some("TERMINATED"));
        assert_eq!(peer_a.recv().await, None);
        assert_eq!(peer_b.recv().await, None);

        // The survivor's later lines are dropped
        let control = state.lock().await.handle_line(Seat::First, Some("WORD cat".into()));
        assert_eq!(control, ReadControl::Stop);
        assert!(state.lock().await.tick().is_none());
    }

    #[tokio::test]
    async fn test_finish_sends_scores_and_summaries() {
        let (state, mut peer_a, mut peer_b) = started_state(60).await;

        {
            let mut s = state.lock().await;
            s.handle_line(Seat::First, Some("WORD cat".into()));
            s.handle_line(Seat::Second, Some("WORD ties".into()));
            s.handle_line(Seat::First, Some("WORD ties".into()));
            s.handle_line(Seat::Second, Some("WORD zzz".into()));
            assert!(s.finish().is_some());
            assert!(s.finish().is_none());
        }

        let mut lines_a = Vec::new();
        while let Some(line) = peer_a.recv().await {
            lines_a.push(line);
        }
        let mut lines_b = Vec::new();
        while let Some(line) = peer_b.recv().await {
            lines_b.push(line);
        }

        assert_eq!(lines_a.last().map(String::as_str), Some("STOP 1 CAT 0  1 TIES 0  1 ZZZ"));
        assert_eq!(lines_b.last().map(String::as_str), Some("STOP 0  1 CAT 1 TIES 1 ZZZ 0 "));
        assert_eq!(lines_a[lines_a.len() - 2], "SCORE 1 -1");
        assert_eq!(lines_b[lines_b.len() - 2], "SCORE -1 1");
    }

    #[tokio::test]
    async fn test_lines_after_finish_are_dropped() {
        let (state, mut peer_a, _peer_b) = started_state(60).await;

        let mut s = state.lock().await;
        s.finish();
        let before = s.player(Seat::First).clone();

        assert_eq!(s.handle_line(Seat::First, Some("WORD cat".into())), ReadControl::Stop);
        assert_eq!(s.handle_line(Seat::First, None), ReadControl::Stop);
        assert_eq!(s.player(Seat::First), &before);
        assert_eq!(s.phase(), SessionPhase::Finished);
        drop(s);

        // Final SCORE and STOP, then close; no TERMINATED
        assert_eq!(peer_a.recv().await.as_deref(), Some("SCORE 0 0"));
        assert!(peer_a.recv().await.unwrap().starts_with("STOP"));
        assert_eq!(peer_a.recv().await, None);
    }

    #[tokio::test]
    async fn test_tick_counts_down() {
        let (state, _peer_a, _peer_b) = started_state(3).await;
        let mut s = state.lock().await;

        assert!(s.tick().is_none());
        assert!(s.tick().is_none());
        assert_eq!(s.remaining_secs(), 1);

        let report = s.tick().unwrap();
        assert_eq!(s.phase(), SessionPhase::Finished);
        assert_eq!(report.duration_secs, 3);
        assert_eq!(report.players[0].name, "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_full_game() {
        let (session, mut peer_a, mut peer_b) = pair(5);
        let runner = tokio::spawn(session.run());

        assert_eq!(peer_a.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 5 bob"));
        assert_eq!(peer_b.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 5 alice"));

        assert!(peer_a.send("WORD cat").await);
        assert_eq!(peer_a.recv().await.as_deref(), Some("SCORE 1 0"));
        assert_eq!(peer_b.recv().await.as_deref(), Some("SCORE 0 1"));

        assert!(peer_b.send("WORD cat").await);
        assert_eq!(peer_a.recv().await.as_deref(), Some("SCORE 0 0"));
        assert_eq!(peer_b.recv().await.as_deref(), Some("SCORE 0 0"));

        // Time auto-advances while everything is idle
        assert_eq!(peer_a.recv().await.as_deref(), Some("SCORE 0 0"));
        assert_eq!(peer_a.recv().await.as_deref(), Some("STOP 0  0  1 CAT 0  0 "));
        assert_eq!(peer_a.recv().await, None);

        assert_eq!(peer_b.recv().await.as_deref(), Some("SCORE 0 0"));
        assert_eq!(peer_b.recv().await.as_deref(), Some("STOP 0  0  1 CAT 0  0 "));
        assert_eq!(peer_b.recv().await, None);

        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_disconnect_mid_game() {
        let (session, mut peer_a, mut peer_b) = pair(60);
        let runner = tokio::spawn(session.run());

        assert!(peer_a.recv().await.unwrap().starts_with("START"));
        assert!(peer_b.recv().await.unwrap().starts_with("START"));

        peer_b.disconnect();

        assert_eq!(peer_a.recv().await.as_deref(), Some("TERMINATED"));
        assert_eq!(peer_a.recv().await, None);
        assert!(matches!(peer_a.try_recv(), None | Some(Outbound::Close)));

        // Session task ends at the next countdown tick
        runner.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simultaneous_same_word_nets_to_zero() {
        let (session, mut peer_a, mut peer_b) = pair(1);
        let state = session.state();
        let runner = tokio::spawn(session.run());

        assert!(peer_a.recv().await.unwrap().starts_with("START"));
        assert!(peer_b.recv().await.unwrap().starts_with("START"));

        let (sent_a, sent_b) = tokio::join!(peer_a.send("WORD cat"), peer_b.send("WORD cat"));
        assert!(sent_a && sent_b);

        runner.await.unwrap();

        let mut lines_a = Vec::new();
        while let Some(line) = peer_a.recv().await {
            lines_a.push(line);
        }
        let mut lines_b = Vec::new();
        while let Some(line) = peer_b.recv().await {
            lines_b.push(line);
        }

        // One credit, one duplicate, then the final scores
        for lines in [&lines_a, &lines_b] {
            assert_eq!(lines.iter().filter(|l| l.starts_with("SCORE")).count(), 3);
            assert_eq!(lines[lines.len() - 2], "SCORE 0 0");
            assert_eq!(lines[lines.len() - 1], "STOP 0  0  1 CAT 0  0 ");
        }

        let s = state.lock().await;
        assert_eq!(s.phase(), SessionPhase::Finished);
        for seat in Seat::BOTH {
            let player = s.player(seat);
            assert_eq!(player.score, 0);
            assert!(player.duplicate.contains("CAT"));
            assert!(!player.legal.contains("CAT"));
        }
    }
}
