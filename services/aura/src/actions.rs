//! Client action classification
//!
//! A keyword heuristic over the generated reply decides whether the browser
//! should play the uplifting song or show the breathing exercise. It is a pure
//! function of the mood label and the reply text.

use serde::Serialize;

pub const BREATHING_EXERCISE: &str = "How about a quick calming exercise? Try taking a few deep breaths: inhale for 4 counts, hold for 4, and exhale slowly for 6.";

const SONG_KEYWORDS: [&str; 2] = ["song", "music"];
const CALM_KEYWORDS: [&str; 3] = ["calm", "breathe", "relax"];

/// Side effect the browser should perform after showing the reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PlaySong,
    SuggestActivity,
}

/// Data accompanying an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionPayload {
    Song { song_url: String },
    Activity { activity_text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAction {
    pub kind: ActionKind,
    pub payload: ActionPayload,
}

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

/// Keyword classifier bound to the provisioned song URL
#[derive(Debug, Clone)]
pub struct ActionClassifier {
    song_url: String,
}

impl ActionClassifier {
    pub fn new(song_url: impl Into<String>) -> Self {
        Self {
            song_url: song_url.into(),
        }
    }

    /// Classify one reply given the mood label it was generated for
    pub fn classify(&self, mood: &str, reply: &str) -> Option<ClientAction> {
        let mood = mood.to_lowercase();
        let reply = reply.to_lowercase();

        if mood.contains("sad") {
            mentions(&reply, &SONG_KEYWORDS).then(|| ClientAction {
                kind: ActionKind::PlaySong,
                payload: ActionPayload::Song {
                    song_url: self.song_url.clone(),
                },
            })
        } else if mood.contains("angry") {
            mentions(&reply, &CALM_KEYWORDS).then(|| ClientAction {
                kind: ActionKind::SuggestActivity,
                payload: ActionPayload::Activity {
                    activity_text: BREATHING_EXERCISE.to_string(),
                },
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG: &str = "/static/audio/121.mp3";

    fn classifier() -> ActionClassifier {
        ActionClassifier::new(SONG)
    }

    #[test]
    fn test_sad_with_song_plays_song() {
        let action = classifier()
            .classify("sad", "You could try listening to a happy song.")
            .unwrap();
        assert_eq!(action.kind, ActionKind::PlaySong);
        assert_eq!(
            action.payload,
            ActionPayload::Song {
                song_url: SONG.to_string()
            }
        );
    }

    #[test]
    fn test_sad_matching_is_case_insensitive() {
        let action = classifier().classify("SAD", "Some MUSIC might help.");
        assert_eq!(action.map(|a| a.kind), Some(ActionKind::PlaySong));
    }

    #[test]
    fn test_angry_with_relax_suggests_activity() {
        let action = classifier()
            .classify("angry", "Try to relax and take a breath.")
            .unwrap();
        assert_eq!(action.kind, ActionKind::SuggestActivity);
        assert_eq!(
            action.payload,
            ActionPayload::Activity {
                activity_text: BREATHING_EXERCISE.to_string()
            }
        );
    }

    #[test]
    fn test_angry_keywords() {
        for reply in ["Stay calm.", "Just breathe.", "Let's relax."] {
            assert!(classifier().classify("angry", reply).is_some(), "{reply}");
        }
    }

    #[test]
    fn test_no_keyword_means_no_action() {
        assert!(classifier().classify("sad", "I'm here for you.").is_none());
        assert!(classifier().classify("angry", "That sounds frustrating.").is_none());
    }

    #[test]
    fn test_keywords_must_match_mood() {
        assert!(classifier().classify("sad", "Take a breath and relax.").is_none());
        assert!(classifier().classify("angry", "Listen to a song.").is_none());
        assert!(classifier().classify("happy", "Listen to a song and relax.").is_none());
        assert!(classifier().classify("neutral", "music calm").is_none());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let first = c.classify("sad", "a song for you");
        for _ in 0..3 {
            assert_eq!(c.classify("sad", "a song for you"), first);
        }
    }

    #[test]
    fn test_payload_serialization() {
        let song = ActionPayload::Song {
            song_url: SONG.to_string(),
        };
        assert_eq!(
            serde_json::to_value(&song).unwrap(),
            serde_json::json!({"song_url": SONG})
        );
        assert_eq!(
            serde_json::to_value(ActionKind::SuggestActivity).unwrap(),
            serde_json::json!("suggest_activity")
        );
    }
}
