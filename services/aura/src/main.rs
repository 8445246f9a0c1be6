use anyhow::Result;
use common::config::AppConfig;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod actions;
mod analyzer;
mod controller;
mod error;
mod generator;
mod middleware;
mod mood;
mod pages;
mod prompts;
mod rate_limiter;
mod routes;
mod session;
mod state;
mod validation;

use crate::state::AppState;

/// Silent 48 kHz mono WAV header, enough for the browser to load the song URL
const PLACEHOLDER_SONG: &[u8] = b"RIFF$\x00\x00\x00WAVEfmt \x10\x00\x00\x00\x01\x00\x01\x00\x80\xbb\x00\x00\x00\xee\x02\x00\x02\x00\x10\x00data\x00\x00\x00\x00";

async fn ensure_song(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }

    warn!("Song file not found at {}, writing a placeholder", path.display());
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, PLACEHOLDER_SONG).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Aura service");

    let config = AppConfig::load()?;
    ensure_song(&config.song_path()).await?;

    let app_state = AppState::from_config(&config).await?;
    info!("Aura service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state, &config.static_dir);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Aura service listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
