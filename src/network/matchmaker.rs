//! Matchmaking
//!
//! Reads each new client's join line and pairs players two at a time.
//! There is no queue: at most one player waits, and the next player to join
//! is paired with them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::game::board::BoardSource;
use crate::game::dictionary::Dictionary;
use crate::network::connection::Connection;
use crate::network::protocol::{parse_join, ServerMessage};
use crate::network::session::{GameSession, Participant};

/// Per-game settings shared by every session.
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Game length in seconds.
    pub duration_secs: u32,
    /// Where boards come from.
    pub board: BoardSource,
    /// Word list.
    pub dictionary: Arc<Dictionary>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            duration_secs: 180,
            board: BoardSource::Random,
            dictionary: Arc::new(Dictionary::default()),
        }
    }
}

/// Result of handling a pre-game line.
pub enum JoinOutcome {
    /// Client left before joining.
    Discarded,
    /// Not a join line; `IGNORING` sent, keep reading from this connection.
    Ignored(Connection),
    /// Player now holds the waiting slot.
    Waiting,
    /// Player paired with the occupant; the session is ready to run.
    Paired(GameSession),
}

/// Pairs joining players into sessions.
#[derive(Debug)]
pub struct Matchmaker {
    settings: GameSettings,
    waiting: Mutex<Option<Participant>>,
    sessions_started: AtomicU64,
}

impl Matchmaker {
    /// Create a matchmaker with an empty slot.
    pub fn new(settings: GameSettings) -> Self {
        Self {
            settings,
            waiting: Mutex::new(None),
            sessions_started: AtomicU64::new(0),
        }
    }

    /// Game settings.
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Take over a freshly accepted connection.
    pub fn on_connection_accepted(self: &Arc<Self>, connection: Connection) {
        let matchmaker = Arc::clone(self);
        tokio::spawn(async move { matchmaker.admit(connection).await });
    }

    /// Read join lines until the client joins or leaves.
    #[instrument(skip_all, fields(peer = %connection.label()))]
    async fn admit(&self, mut connection: Connection) {
        loop {
            let line = connection.read_line().await;
            match self.on_first_line(connection, line).await {
                JoinOutcome::Ignored(conn) => connection = conn,
                JoinOutcome::Paired(session) => {
                    tokio::spawn(session.run());
                    return;
                }
                JoinOutcome::Waiting | JoinOutcome::Discarded => return,
            }
        }
    }

    /// Handle one pre-game read result. `None` means end-of-stream.
    ///
    /// End-of-stream and an empty line both discard the connection.
    pub async fn on_first_line(&self, connection: Connection, line: Option<String>) -> JoinOutcome {
        let mut waiting = self.waiting.lock().await;

        let line = match line {
            Some(line) if !line.is_empty() => line,
            _ => {
                debug!("{} left before joining", connection.label());
                connection.writer.close();
                return JoinOutcome::Discarded;
            }
        };

        let name = match parse_join(&line) {
            Some(name) => name.to_string(),
            None => {
                connection.send_line(ServerMessage::Ignoring(line));
                return JoinOutcome::Ignored(connection);
            }
        };
        let player = Participant::new(name, connection);

        match waiting.take() {
            Some(occupant) if occupant.connection.writer.is_connected() => {
                let session = GameSession::new(occupant, player, &self.settings);
                let count = self.sessions_started.fetch_add(1, Ordering::Relaxed) + 1;
                let [first, second] = session.player_names();
                info!(
                    "Paired {} with {} (session {}, #{})",
                    first, second, hex::encode(&session.id()[..4]), count
                );
                JoinOutcome::Paired(session)
            }
            stale => {
                if let Some(gone) = stale {
                    debug!("Dropping stale waiting player {}", gone.record.name);
                }
                info!("{} is waiting for an opponent", player.record.name);
                *waiting = Some(player);
                JoinOutcome::Waiting
            }
        }
    }

    /// Name of the player in the slot, if still connected.
    pub async fn waiting_player(&self) -> Option<String> {
        self.waiting
            .lock()
            .await
            .as_ref()
            .filter(|p| p.connection.writer.is_connected())
            .map(|p| p.record.name.clone())
    }

    /// Sessions paired so far.
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::Relaxed)
    }
}
