//! Mood inference gateway
//!
//! Turns a browser frame into exactly one mood label. Analyzer failures and
//! frames without a face collapse to `neutral`; the gateway itself never
//! returns an error.

use base64::{Engine, engine::general_purpose::STANDARD};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analyzer::EmotionAnalyzer;

/// Emotion vocabulary produced by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    #[default]
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Angry,
        Mood::Disgust,
        Mood::Fear,
        Mood::Happy,
        Mood::Sad,
        Mood::Surprise,
        Mood::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Angry => "angry",
            Mood::Disgust => "disgust",
            Mood::Fear => "fear",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Surprise => "surprise",
            Mood::Neutral => "neutral",
        }
    }

    /// Parse a label case-insensitively; anything unrecognized is neutral
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str().eq_ignore_ascii_case(label))
            .unwrap_or_default()
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded RGB frame, height x width x 3 bytes
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Errors raised while turning a client payload into a frame
#[derive(Error, Debug)]
pub enum FrameError {
    /// The payload is not valid base64
    #[error("Invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The bytes are not a decodable image
    #[error("Could not decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode a `data:image/...;base64,` URL (or bare base64) into a frame
pub fn decode_frame(payload: &str) -> Result<Frame, FrameError> {
    let encoded = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };
    let bytes = STANDARD.decode(encoded.trim())?;
    decode_frame_bytes(&bytes)
}

/// Decode raw image bytes into a frame
pub fn decode_frame_bytes(bytes: &[u8]) -> Result<Frame, FrameError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    Ok(Frame::new(image))
}

/// Outcome of one mood inference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodReading {
    pub mood: Mood,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl MoodReading {
    pub fn neutral(error_detail: impl Into<String>) -> Self {
        Self {
            mood: Mood::Neutral,
            error_detail: Some(error_detail.into()),
        }
    }
}

/// Calls the external analyzer and reduces its answer to one label
#[derive(Clone)]
pub struct MoodGateway {
    analyzer: Arc<dyn EmotionAnalyzer>,
}

impl MoodGateway {
    pub fn new(analyzer: Arc<dyn EmotionAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Dominant emotion of the first detected face, or neutral
    pub async fn detect(&self, frame: &Frame) -> MoodReading {
        match self.analyzer.analyze(frame).await {
            Ok(faces) => {
                let mood = faces
                    .first()
                    .and_then(|face| face.dominant_emotion.as_deref())
                    .map(Mood::from_label)
                    .unwrap_or_default();
                debug!(
                    "Analyzer returned {} face(s), dominant mood {}",
                    faces.len(),
                    mood
                );
                MoodReading {
                    mood,
                    error_detail: None,
                }
            }
            Err(e) => {
                warn!("Error in mood detection: {}", e);
                MoodReading::neutral(e.to_string())
            }
        }
    }
}
