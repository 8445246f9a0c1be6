//! Application state shared across handlers

use anyhow::Result;
use common::{ConversationStore, config::AppConfig, registry::UserRegistry, store::JsonFileStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    actions::ActionClassifier,
    analyzer::{AnalyzerConfig, DeepFaceClient},
    controller::ResponseController,
    generator::{GeminiClient, GeminiConfig, TextGenerator},
    mood::MoodGateway,
    pages::Pages,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    session::{SessionConfig, SessionService},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub registry: UserRegistry,
    pub sessions: SessionService,
    pub rate_limiter: RateLimiter,
    pub mood_gateway: MoodGateway,
    pub controller: ResponseController,
    pub pages: Pages,
}

impl AppState {
    /// Wire every component from the loaded configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn ConversationStore> =
            Arc::new(JsonFileStore::open(&config.data_dir).await?);
        let registry = UserRegistry::new(config.data_dir.join("users.json"));

        let sessions = SessionService::new(SessionConfig::new(
            config.session_secret.as_deref(),
            config.session_ttl_seconds,
        ));

        let rate_limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: config.login_max_attempts,
            window: Duration::from_secs(config.login_window_seconds),
            ban_duration: Duration::from_secs(config.login_ban_seconds),
        });

        let analyzer = DeepFaceClient::new(AnalyzerConfig {
            base_url: config.analyzer_url.clone(),
            detector_backend: config.analyzer_detector_backend.clone(),
            timeout: Duration::from_secs(config.analyzer_timeout_seconds),
        })?;
        info!("Emotion analyzer configured at {}", config.analyzer_url);

        let generator: Option<Arc<dyn TextGenerator>> = match &config.gemini_api_key {
            Some(api_key) => {
                let client = GeminiClient::new(GeminiConfig {
                    api_key: api_key.clone(),
                    model: config.gemini_model.clone(),
                    base_url: config.gemini_base_url.clone(),
                    timeout: Duration::from_secs(config.gemini_timeout_seconds),
                })?;
                info!("Text generation configured with model {}", client.model());
                Some(Arc::new(client))
            }
            None => {
                warn!("No Gemini API key configured, chat replies will be unavailable");
                None
            }
        };

        let controller = ResponseController::new(
            generator,
            store.clone(),
            ActionClassifier::new(config.song_url()),
        );

        Ok(Self {
            store,
            registry,
            sessions,
            rate_limiter,
            mood_gateway: MoodGateway::new(Arc::new(analyzer)),
            controller,
            pages: Pages::new()?,
        })
    }
}
