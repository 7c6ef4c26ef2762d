//! Line Transport
//!
//! One task per socket owns the `Framed<TcpStream, LinesCodec>` and moves
//! lines between the socket and two channels. The rest of the server only
//! sees a cloneable [`LineWriter`] and a single-owner [`LineReader`], so a
//! connection has at most one read in flight.
//!
//! Outbound is unbounded: sends made while holding a session lock never wait
//! on the peer.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, warn};

/// Longest line accepted from a client.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Lines queued for the reader.
pub const INBOUND_BUFFER: usize = 64;

/// Unread lines held by a socket task beyond the reader's queue.
pub const MAX_PENDING_LINES: usize = 1024;

/// Instruction for the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write one line.
    Line(String),
    /// Flush, shut down the socket and stop.
    Close,
}

/// Sending half of a connection.
#[derive(Clone, Debug)]
pub struct LineWriter {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Outbound>,
    connected: Arc<AtomicBool>,
}

impl LineWriter {
    /// Queue a line. Returns false if the connection is already gone.
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.tx.send(Outbound::Line(line.into())).is_ok()
    }

    /// Flush queued lines and close the connection.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
        let _ = self.tx.send(Outbound::Close);
    }

    /// Is the peer still there, as far as we know?
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Peer label for logs.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Receiving half of a connection.
#[derive(Debug)]
pub struct LineReader {
    rx: mpsc::Receiver<String>,
}

impl LineReader {
    /// Next line, or `None` once the peer has disconnected.
    pub async fn read_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Both halves of a client connection.
#[derive(Debug)]
pub struct Connection {
    /// Sending half.
    pub writer: LineWriter,
    /// Receiving half.
    pub reader: LineReader,
}

impl Connection {
    /// Take ownership of a TCP stream and spawn its socket task.
    ///
    /// `permit` is held until the socket task ends.
    pub fn spawn_tcp(
        stream: TcpStream,
        peer: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(INBOUND_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let task_connected = connected.clone();
        tokio::spawn(async move {
            run_socket(framed, peer, in_tx, out_rx, task_connected).await;
            drop(permit);
        });

        Self {
            writer: LineWriter {
                label: Arc::from(peer.to_string()),
                tx: out_tx,
                connected,
            },
            reader: LineReader { rx: in_rx },
        }
    }

    /// An in-process connection, with the client end returned as a [`RemotePeer`].
    pub fn in_memory(label: &str) -> (Self, RemotePeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(INBOUND_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));

        let connection = Self {
            writer: LineWriter {
                label: Arc::from(label),
                tx: out_tx,
                connected: connected.clone(),
            },
            reader: LineReader { rx: in_rx },
        };
        let peer = RemotePeer {
            tx: Some(in_tx),
            rx: out_rx,
            connected,
        };

        (connection, peer)
    }

    /// Queue a line.
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.writer.send_line(line)
    }

    /// Next line, or `None` once the peer has disconnected.
    pub async fn read_line(&mut self) -> Option<String> {
        self.reader.read_line().await
    }

    /// Peer label for logs.
    pub fn label(&self) -> &str {
        self.writer.label()
    }
}

/// Pump lines between the socket and the channels until either side ends.
///
/// Lines the reader has not taken yet wait in a local backlog, so the socket
/// keeps being read and end-of-stream is noticed even while nobody is
/// reading. A client that runs past [`MAX_PENDING_LINES`] is dropped.
async fn run_socket(
    framed: Framed<TcpStream, LinesCodec>,
    peer: SocketAddr,
    inbound: mpsc::Sender<String>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    connected: Arc<AtomicBool>,
) {
    // Once the reader half is dropped, incoming lines are discarded
    // but queued outbound lines still go out.
    let mut reader_open = true;
    let mut reading = true;
    let mut backlog: VecDeque<String> = VecDeque::new();
    let (mut sink, mut stream): (SplitSink<Framed<TcpStream, LinesCodec>, String>, _) =
        framed.split();

    loop {
        tokio::select! {
            permit = inbound.reserve(), if reader_open && !backlog.is_empty() => match permit {
                Ok(permit) => {
                    if let Some(line) = backlog.pop_front() {
                        permit.send(line);
                    }
                }
                Err(_) => {
                    reader_open = false;
                    backlog.clear();
                }
            },
            line = stream.next(), if reading => match line {
                Some(Ok(_)) if !reader_open => {}
                Some(Ok(line)) => {
                    if backlog.len() >= MAX_PENDING_LINES {
                        warn!(%peer, "Too many unread lines, dropping connection");
                        break;
                    }
                    backlog.push_back(line);
                }
                Some(Err(e)) => {
                    warn!(%peer, "Read error: {}", e);
                    reading = false;
                    connected.store(false, Ordering::Release);
                }
                None => {
                    debug!(%peer, "Peer closed connection");
                    reading = false;
                    connected.store(false, Ordering::Release);
                }
            },
            msg = outbound.recv() => match msg {
                Some(Outbound::Line(line)) => {
                    if let Err(e) = sink.send(line).await {
                        warn!(%peer, "Write error: {}", e);
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = sink.close().await {
                        debug!(%peer, "Error closing socket: {}", e);
                    }
                    break;
                }
            },
        }

        // After end-of-stream, stay only to hand over lines already read
        if !reading && (backlog.is_empty() || !reader_open) {
            break;
        }
    }

    connected.store(false, Ordering::Release);
    debug!(%peer, "Socket task finished");
}

// =============================================================================
// IN-PROCESS CLIENT
// =============================================================================

/// Client end of an in-memory [`Connection`].
#[derive(Debug)]
pub struct RemotePeer {
    tx: Option<mpsc::Sender<String>>,
    rx: mpsc::UnboundedReceiver<Outbound>,
    connected: Arc<AtomicBool>,
}

impl RemotePeer {
    /// Send a line to the server. Returns false after [`disconnect`](Self::disconnect).
    pub async fn send(&self, line: &str) -> bool {
        match &self.tx {
            Some(tx) => tx.send(line.to_string()).await.is_ok(),
            None => false,
        }
    }

    /// Next line from the server, or `None` once the server closed the connection.
    pub async fn recv(&mut self) -> Option<String> {
        match self.rx.recv().await? {
            Outbound::Line(line) => Some(line),
            Outbound::Close => {
                self.rx.close();
                None
            }
        }
    }

    /// Next line if one is already queued.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }

    /// Hang up; the server sees end-of-stream.
    pub fn disconnect(&mut self) {
        self.connected.store(false, Ordering::Release);
        self.tx = None;
    }
}
