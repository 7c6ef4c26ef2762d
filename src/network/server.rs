//! TCP Game Server
//!
//! Accepts connections, enforces the connection limit, and hands each socket
//! to the [`Matchmaker`].

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use crate::network::connection::Connection;
use crate::network::matchmaker::{GameSettings, Matchmaker};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], crate::DEFAULT_PORT)),
            max_connections: 1000,
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    listener: TcpListener,
    matchmaker: Arc<Matchmaker>,
    connection_limit: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
}

impl GameServer {
    /// Bind the listening socket.
    pub async fn bind(
        config: ServerConfig,
        settings: GameSettings,
    ) -> Result<Self, GameServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| GameServerError::Bind { addr: config.bind_addr, source })?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            matchmaker: Arc::new(Matchmaker::new(settings)),
            config,
            listener,
            shutdown_tx,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, GameServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until [`shutdown`](Self::shutdown) is called.
    ///
    /// Sessions already running are left to finish on their own tasks.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        info!(
            "Game server listening on {} ({}s games, max {} connections)",
            self.local_addr()?,
            self.matchmaker.settings().duration_secs,
            self.config.max_connections
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow_and_update() {
            info!("Shutdown requested before start");
            return Ok(());
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let permit = match self.connection_limit.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!("Connection limit reached, rejecting {}", addr);
                                    continue;
                                }
                            };

                            debug!("New connection from {}", addr);
                            let connection = Connection::spawn_tcp(stream, addr, Some(permit));
                            self.matchmaker.on_connection_accepted(connection);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Stop accepting connections. Takes effect even if `run` has not started yet.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.config.max_connections - self.connection_limit.available_permits()
    }

    /// The matchmaker.
    pub fn matchmaker(&self) -> &Arc<Matchmaker> {
        &self.matchmaker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::BoardSource;
    use crate::game::dictionary::Dictionary;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpStream;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    fn test_settings(duration_secs: u32) -> GameSettings {
        GameSettings {
            duration_secs,
            board: BoardSource::Fixed("QDDEATSDCIESKYTI".parse().unwrap()),
            dictionary: Arc::new(Dictionary::from_words(["CAT", "TIE"])),
        }
    }

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        write: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read, write) = stream.into_split();
            Self { lines: BufReader::new(read).lines(), write }
        }

        async fn send(&mut self, line: &str) {
            self.write.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> Option<String> {
            self.lines.next_line().await.unwrap()
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 2000);
        assert_eq!(config.max_connections, 1000);
    }

    #[tokio::test]
    async fn test_bind_and_shutdown() {
        let server = Arc::new(GameServer::bind(test_config(), test_settings(60)).await.unwrap());
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.connection_count(), 0);

        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };
        tokio::task::yield_now().await;
        server.shutdown();

        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let server = GameServer::bind(test_config(), test_settings(60)).await.unwrap();
        server.shutdown();

        tokio::time::timeout(Duration::from_secs(5), server.run())
            .await
            .expect("run ignored the earlier shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = GameServer::bind(test_config(), test_settings(60)).await.unwrap();
        let config = ServerConfig {
            bind_addr: first.local_addr().unwrap(),
            ..Default::default()
        };

        let err = GameServer::bind(config, test_settings(60)).await.err().unwrap();
        assert!(matches!(err, GameServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_full_game_over_tcp() {
        let server = Arc::new(GameServer::bind(test_config(), test_settings(2)).await.unwrap());
        let addr = server.local_addr().unwrap();
        {
            let server = server.clone();
            tokio::spawn(async move { server.run().await });
        }

        let mut alice = Client::connect(addr).await;
        alice.send("hi").await;
        assert_eq!(alice.recv().await.as_deref(), Some("IGNORING hi"));
        alice.send("PLAY alice").await;

        while server.matchmaker().waiting_player().await.is_none() {
            tokio::task::yield_now().await;
        }

        let mut bob = Client::connect(addr).await;
        bob.send("PLAY bob").await;

        assert_eq!(alice.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 2 bob"));
        assert_eq!(bob.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 2 alice"));

        alice.send("WORD cat").await;
        assert_eq!(alice.recv().await.as_deref(), Some("SCORE 1 0"));
        assert_eq!(bob.recv().await.as_deref(), Some("SCORE 0 1"));

        bob.send("what").await;
        assert_eq!(bob.recv().await.as_deref(), Some("IGNORING WHAT"));

        assert_eq!(alice.recv().await.as_deref(), Some("SCORE 1 0"));
        assert_eq!(alice.recv().await.as_deref(), Some("STOP 1 CAT 0  0  0  0 "));
        assert_eq!(alice.recv().await, None);

        assert_eq!(bob.recv().await.as_deref(), Some("SCORE 0 1"));
        assert_eq!(bob.recv().await.as_deref(), Some("STOP 0  1 CAT 0  0  0 "));
        assert_eq!(bob.recv().await, None);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_disconnect_over_tcp() {
        let server = Arc::new(GameServer::bind(test_config(), test_settings(60)).await.unwrap());
        let addr = server.local_addr().unwrap();
        {
            let server = server.clone();
            tokio::spawn(async move { server.run().await });
        }

        let mut alice = Client::connect(addr).await;
        alice.send("PLAY alice").await;
        while server.matchmaker().waiting_player().await.is_none() {
            tokio::task::yield_now().await;
        }
        let mut bob = Client::connect(addr).await;
        bob.send("PLAY bob").await;

        assert!(alice.recv().await.unwrap().starts_with("START"));
        assert!(bob.recv().await.unwrap().starts_with("START"));

        drop(bob);

        assert_eq!(alice.recv().await.as_deref(), Some("TERMINATED"));
        assert_eq!(alice.recv().await, None);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_departed_waiting_player_is_not_paired() {
        let server = Arc::new(GameServer::bind(test_config(), test_settings(60)).await.unwrap());
        let addr = server.local_addr().unwrap();
        {
            let server = server.clone();
            tokio::spawn(async move { server.run().await });
        }
        let matchmaker = server.matchmaker().clone();

        let mut alice = Client::connect(addr).await;
        alice.send("PLAY alice").await;
        while matchmaker.waiting_player().await.is_none() {
            tokio::task::yield_now().await;
        }

        // Far more lines than anyone reads while waiting, then leave
        for _ in 0..100 {
            alice.send("WORD xyz").await;
        }
        drop(alice);

        tokio::time::timeout(Duration::from_secs(5), async {
            while matchmaker.waiting_player().await.is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("departure not noticed");

        let mut bob = Client::connect(addr).await;
        bob.send("PLAY bob").await;
        while matchmaker.waiting_player().await.as_deref() != Some("bob") {
            tokio::task::yield_now().await;
        }
        assert_eq!(matchmaker.sessions_started(), 0);

        let mut carol = Client::connect(addr).await;
        carol.send("PLAY carol").await;

        assert_eq!(bob.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 60 carol"));
        assert_eq!(carol.recv().await.as_deref(), Some("START QDDEATSDCIESKYTI 60 bob"));

        server.shutdown();
    }
}
