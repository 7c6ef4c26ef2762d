//! Boggle Game Server
//!
//! Loads the dictionary, then serves two-player games until interrupted.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::select;
use tracing::info;
use tracing_subscriber::EnvFilter;

use boggle::{
    Board, BoardSource, Dictionary, GameServer, GameSettings, ServerConfig, DEFAULT_PORT, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "boggle-server", version, about = "Two-player Boggle server")]
struct Args {
    /// Game length in seconds
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    seconds: u32,

    /// Word list, one word per line
    dictionary: PathBuf,

    /// Fixed 16-letter board used for every game (random if omitted)
    board: Option<Board>,

    #[arg(long, env = "BOGGLE_PORT", default_value_t = DEFAULT_PORT, help = "Listen port")]
    port: u16,

    #[arg(long, env = "BOGGLE_BIND", default_value = "0.0.0.0", help = "Listen address")]
    bind: IpAddr,

    #[arg(
        long,
        env = "BOGGLE_MAX_CONNECTIONS",
        default_value_t = 1000,
        help = "Maximum concurrent connections"
    )]
    max_connections: usize,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Boggle Server v{}", VERSION);

    let dictionary = Dictionary::load(&args.dictionary)
        .with_context(|| format!("loading dictionary {}", args.dictionary.display()))?;

    let board = match args.board {
        Some(board) => {
            info!("Using fixed board {}", board);
            BoardSource::Fixed(board)
        }
        None => BoardSource::Random,
    };

    let settings = GameSettings {
        duration_secs: args.seconds,
        board,
        dictionary: Arc::new(dictionary),
    };
    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        max_connections: args.max_connections,
    };

    let server = GameServer::bind(config, settings)
        .await
        .context("starting server")?;

    select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping...");
        }
    }
    info!("Done.");

    Ok(())
}
