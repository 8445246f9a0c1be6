//! Face/emotion analyzer client
//!
//! The analyzer is an external service. `DeepFaceClient` speaks the DeepFace
//! REST API: one `POST /analyze` per frame with the image inlined as a data
//! URL.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::mood::Frame;

/// Per-face analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub dominant_emotion: Option<String>,
    /// Confidence per emotion label, when the analyzer reports it
    #[serde(default)]
    pub emotion: Option<HashMap<String, f64>>,
}

/// Errors raised by an emotion analyzer
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Analyzer request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Analyzer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

/// Something that can find faces in a frame and rank their emotions
#[async_trait]
pub trait EmotionAnalyzer: Send + Sync {
    /// Analyze a frame; an empty list means no face was found
    async fn analyze(&self, frame: &Frame) -> Result<Vec<FaceAnalysis>, AnalyzerError>;
}

/// Analyzer connection settings
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub base_url: String,
    pub detector_backend: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    img: String,
    actions: [&'a str; 1],
    detector_backend: &'a str,
    enforce_detection: bool,
}

/// The analyzer answers with a wrapped list, a bare list, or a single face
#[derive(Deserialize)]
#[serde(untagged)]
enum AnalyzeResponse {
    Wrapped { results: Vec<FaceAnalysis> },
    List(Vec<FaceAnalysis>),
    Single(FaceAnalysis),
}

impl From<AnalyzeResponse> for Vec<FaceAnalysis> {
    fn from(response: AnalyzeResponse) -> Self {
        match response {
            AnalyzeResponse::Wrapped { results } => results,
            AnalyzeResponse::List(results) => results,
            AnalyzeResponse::Single(result) => vec![result],
        }
    }
}

/// HTTP client for a DeepFace analysis server
#[derive(Clone)]
pub struct DeepFaceClient {
    http: reqwest::Client,
    config: AnalyzerConfig,
}

impl DeepFaceClient {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn encode_frame(frame: &Frame) -> Result<String, AnalyzerError> {
        let mut jpeg = Vec::new();
        frame
            .image()
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
    }
}

#[async_trait]
impl EmotionAnalyzer for DeepFaceClient {
    async fn analyze(&self, frame: &Frame) -> Result<Vec<FaceAnalysis>, AnalyzerError> {
        let request = AnalyzeRequest {
            img: Self::encode_frame(frame)?,
            actions: ["emotion"],
            detector_backend: &self.config.detector_backend,
            enforce_detection: false,
        };

        let url = format!("{}/analyze", self.config.base_url.trim_end_matches('/'));
        debug!(
            "Sending {}x{} frame to analyzer at {}",
            frame.width(),
            frame.height(),
            url
        );

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnalyzeResponse = response.json().await?;
        Ok(parsed.into())
    }
}
