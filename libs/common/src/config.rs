//! Application configuration
//!
//! Settings are layered with the `config` crate: built-in defaults first,
//! then any `AURA_*` environment variable on top.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level configuration for the Aura service
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// Root directory for users, conversations and mood history
    pub data_dir: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Audio file played for the `play_song` action, relative to `static_dir`
    pub song_file: String,
    /// HMAC secret for session tokens; generated per process when unset
    pub session_secret: Option<String>,
    /// Session token lifetime in seconds
    pub session_ttl_seconds: u64,
    /// Gemini API key; the chat runs in unavailable mode without it
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout_seconds: u64,
    /// Base URL of the face/emotion analysis service
    pub analyzer_url: String,
    pub analyzer_detector_backend: String,
    pub analyzer_timeout_seconds: u64,
    /// Login attempts allowed per window before a temporary ban
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub login_ban_seconds: u64,
}

impl AppConfig {
    /// Load the configuration from defaults and the environment
    ///
    /// # Environment Variables
    /// Every field can be overridden with `AURA_<FIELD>`, e.g.
    /// `AURA_BIND_ADDRESS` or `AURA_GEMINI_API_KEY`. A plain `GEMINI_API_KEY`
    /// is honoured when `AURA_GEMINI_API_KEY` is not set.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config: AppConfig = Config::builder()
            .set_default("bind_address", "0.0.0.0:5000")?
            .set_default("data_dir", "data")?
            .set_default("static_dir", "static")?
            .set_default("song_file", "audio/121.mp3")?
            .set_default("session_ttl_seconds", 86_400)?
            .set_default("gemini_model", "gemini-2.5-flash-preview-05-20")?
            .set_default(
                "gemini_base_url",
                "https://generativelanguage.googleapis.com",
            )?
            .set_default("gemini_timeout_seconds", 30)?
            .set_default("analyzer_url", "http://localhost:5005")?
            .set_default("analyzer_detector_backend", "opencv")?
            .set_default("analyzer_timeout_seconds", 30)?
            .set_default("login_max_attempts", 5)?
            .set_default("login_window_seconds", 300)?
            .set_default("login_ban_seconds", 900)?
            .add_source(Environment::with_prefix("AURA"))
            .build()?
            .try_deserialize()?;

        if config.gemini_api_key.is_none() {
            config.gemini_api_key = std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        Ok(config)
    }

    /// Public URL of the pre-provisioned song
    pub fn song_url(&self) -> String {
        format!("/static/{}", self.song_file.trim_start_matches('/'))
    }

    /// Absolute on-disk location of the pre-provisioned song
    pub fn song_path(&self) -> PathBuf {
        self.static_dir.join(&self.song_file)
    }
}
