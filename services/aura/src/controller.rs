//! Mood-aware response controller
//!
//! One chat turn: pick a prompt from mood and user text, ask the generator,
//! classify the reply into an optional client action, and log the exchange.
//! Generation failures never escape; they become a fixed fallback reply with
//! the error attached as `error_detail`.

use common::ConversationStore;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    actions::{ActionClassifier, ActionKind, ActionPayload},
    generator::TextGenerator,
    mood::Mood,
    prompts::build_prompt,
};

pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response at this moment.";
pub const UNAVAILABLE_REPLY: &str = "Sorry, the chat service is currently unavailable.";
pub const UNAVAILABLE_DETAIL: &str = "Gemini model not loaded.";

/// Reply sent back to the browser
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub action: Option<ActionKind>,
    pub action_payload: Option<ActionPayload>,
    /// Diagnostic only, never shown to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ChatReply {
    fn degraded(reply: &str, detail: String) -> Self {
        Self {
            reply: reply.to_string(),
            action: None,
            action_payload: None,
            error_detail: Some(detail),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Not authenticated")]
    Unauthenticated,
}

/// Conversation log line used when the turn had no user text
pub fn proactive_placeholder(mood: Mood) -> String {
    format!("({mood} detected - proactive)")
}

#[derive(Clone)]
pub struct ResponseController {
    generator: Option<Arc<dyn TextGenerator>>,
    store: Arc<dyn ConversationStore>,
    classifier: ActionClassifier,
}

impl ResponseController {
    /// `generator` is `None` when no generation backend is configured
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        store: Arc<dyn ConversationStore>,
        classifier: ActionClassifier,
    ) -> Self {
        Self {
            generator,
            store,
            classifier,
        }
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    /// Run one chat turn for `identity`
    ///
    /// An absent or unknown `mood` is treated as neutral. The exchange is
    /// appended to the store exactly once, on success and on failure.
    pub async fn respond(
        &self,
        identity: Option<&str>,
        mood: Option<&str>,
        user_text: &str,
    ) -> Result<ChatReply, ControllerError> {
        let username = identity.ok_or(ControllerError::Unauthenticated)?;
        let mood = mood.map(Mood::from_label).unwrap_or_default();
        let (branch, prompt) = build_prompt(mood, user_text);
        info!("Chat turn for {} ({:?}, mood {})", username, branch, mood);

        let reply = match &self.generator {
            None => ChatReply::degraded(UNAVAILABLE_REPLY, UNAVAILABLE_DETAIL.to_string()),
            Some(generator) => match generator.generate(&prompt).await {
                Ok(text) => {
                    let action = self.classifier.classify(mood.as_str(), &text);
                    let (action, action_payload) = match action {
                        Some(action) => (Some(action.kind), Some(action.payload)),
                        None => (None, None),
                    };
                    ChatReply {
                        reply: text,
                        action,
                        action_payload,
                        error_detail: None,
                    }
                }
                Err(e) => {
                    warn!("Error in chat generation: {}", e);
                    ChatReply::degraded(FALLBACK_REPLY, e.to_string())
                }
            },
        };

        let user_utterance = if user_text.is_empty() {
            proactive_placeholder(mood)
        } else {
            user_text.to_string()
        };
        if let Err(e) = self
            .store
            .append(Some(username), &user_utterance, &reply.reply)
            .await
        {
            error!("Failed to save conversation for {}: {}", username, e);
        }

        Ok(reply)
    }
}
