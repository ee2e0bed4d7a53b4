use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod client;
mod config;
mod error;
mod gemini;
mod models;
mod playlist;
mod server;


use crate::auth::SpotifyAuth;
use crate::client::{MusicCatalog, SpotifyClient};
use crate::config::load_config;
use crate::gemini::{GeminiClient, SongOracle};
use crate::playlist::{PlaylistGenerator, PlaylistRegistry, PlaylistSweeper};
use crate::server::{ServerState, run_server};

#[derive(Parser)]
#[command(name = "mood-playlist-generator")]
#[command(about = "Backend generating Spotify playlists from a mood description")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load configuration from .env
    let config = load_config()?;

    let agent = ureq::Agent::new();
    let auth = Arc::new(SpotifyAuth::new(agent.clone(), &config.spotify));
    if !auth.is_authorized() {
        warn!(
            "Spotify is not authorized, open http://{}:{}/login to connect an account",
            args.host, args.port
        );
    }

    let catalog: Arc<dyn MusicCatalog> = Arc::new(SpotifyClient::new(agent.clone(), auth.clone()));
    let oracle: Arc<dyn SongOracle> = Arc::new(GeminiClient::new(
        agent,
        config.google_api_key,
        config.gemini_model,
    ));
    let registry = Arc::new(PlaylistRegistry::new());

    let shutdown = CancellationToken::new();
    let sweeper = PlaylistSweeper::new(registry.clone(), catalog.clone()).spawn(shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutting down");
            shutdown.cancel();
        }
    });

    let state = ServerState {
        generator: Arc::new(PlaylistGenerator::new(oracle, catalog, registry)),
        auth,
    };
    let result = run_server(state, &args.host, args.port, shutdown.clone().cancelled_owned()).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Playlist sweeper panicked: {e}");
    }
    result
}
