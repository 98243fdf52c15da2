//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::emoji::EmojiCategories;
use crate::emotion::{Emotion, EmotionScore, LabelScores};
use crate::features::FeatureVector;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub audio_path: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub audio_path: String,
    pub predicted_emotion: Emotion,
    pub confidence: f32,
    pub all_scores: LabelScores,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub transcription: String,
    pub emotion_scores: Vec<EmotionScore>,
    pub suggested_emojis: Vec<String>,
    pub audio_features: FeatureVector,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` once the model is ready, `loading` before, `unhealthy` if it failed
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_state: &'static str,
    pub device: String,
    pub transcription: bool,
    pub version: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<EndpointInfo>,
    pub supported_emotions: Vec<Emotion>,
}

#[derive(Debug, Serialize)]
pub struct EmojisResponse {
    pub success: bool,
    pub data: EmojiCategories,
}
