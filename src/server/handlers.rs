//! Route handlers.
//!
//! Decoding, feature extraction and inference are CPU-bound, so each request
//! hands its pipeline to `spawn_blocking` and only does I/O on the runtime.

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::types::{
    AnalyzeResponse, EmojisResponse, EndpointInfo, HealthResponse, PredictRequest, PredictResponse,
    ServiceInfo,
};
use super::AppState;
use crate::audio::{AudioLoader, StagedUpload};
use crate::emoji::EmojiMapper;
use crate::emotion::{Emotion, EmotionClassifier};
use crate::features::extract_audio_features;
use crate::transcription::{normalize_language, Transcriber};

/// Emotion scores returned by `/analyze`
const ANALYZE_TOP_EMOTIONS: usize = 5;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Speech Emotion Recognition API",
        version: VERSION,
        endpoints: vec![
            EndpointInfo {
                method: "GET",
                path: "/",
                description: "API information",
            },
            EndpointInfo {
                method: "GET",
                path: "/health",
                description: "Health check",
            },
            EndpointInfo {
                method: "POST",
                path: "/predict",
                description: "Predict emotion from an audio file path",
            },
            EndpointInfo {
                method: "POST",
                path: "/analyze",
                description: "Emotion, emojis, features and transcript for an uploaded file",
            },
            EndpointInfo {
                method: "GET",
                path: "/emojis",
                description: "Emoji palette grouped by mood",
            },
        ],
        supported_emotions: Emotion::ALL.to_vec(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model = state.classifier.status();
    let status = match model.state {
        "ready" => "healthy",
        "failed" => "unhealthy",
        _ => "loading",
    };
    Json(HealthResponse {
        status,
        model_loaded: model.ready,
        model_state: model.state,
        device: model.device.unwrap_or_else(|| "not initialized".to_string()),
        transcription: state.transcriber.is_some(),
        version: VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn emojis(State(state): State<AppState>) -> Json<EmojisResponse> {
    Json(EmojisResponse {
        success: true,
        data: state.emojis.categories().clone(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::ResourceNotFound("Endpoint not found".to_string())
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let debug = state.config.debug;
    predict_inner(state, payload)
        .await
        .map(Json)
        .map_err(|e| e.for_client(debug))
}

async fn predict_inner(
    state: AppState,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<PredictResponse, ApiError> {
    let Json(request) = payload?;
    let audio_path = request.audio_path.trim().to_string();
    if audio_path.is_empty() {
        return Err(ApiError::InputValidation(
            "Missing \"audio_path\" in request body".to_string(),
        ));
    }

    let path = PathBuf::from(&audio_path);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(ApiError::InputValidation(format!(
                "Path is not a file: {}",
                audio_path
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::ResourceNotFound(format!(
                "Audio file not found: {}",
                audio_path
            )))
        }
        Err(e) => return Err(ApiError::Unexpected(format!("Cannot access {}: {}", audio_path, e))),
    }

    let classifier = state.classifier.classifier()?;
    let loader = Arc::clone(&state.loader);
    let request_id = Uuid::new_v4();
    info!("[{}] Predicting emotion for {}", request_id, audio_path);

    let scores = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let signal = loader.load(&path)?;
        let scores = classifier.classify(&signal)?;
        debug!("[{}] Prediction took {:?}", request_id, start.elapsed());
        Ok::<_, ApiError>(scores)
    })
    .await??;

    let top = *scores
        .top()
        .ok_or_else(|| ApiError::Inference("Classifier returned no scores".to_string()))?;

    info!(
        "[{}] Prediction: {} ({:.2}%)",
        request_id,
        top.emotion,
        top.score * 100.0
    );

    Ok(PredictResponse {
        success: true,
        audio_path,
        predicted_emotion: top.emotion,
        confidence: top.score,
        all_scores: scores.label_scores(),
    })
}

pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let debug = state.config.debug;
    analyze_inner(state, multipart)
        .await
        .map(Json)
        .map_err(|e| e.for_client(debug))
}

/// Fields pulled out of the `/analyze` form
struct AnalyzeForm {
    file_name: Option<String>,
    audio: Vec<u8>,
    language: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<AnalyzeForm, ApiError> {
    let mut audio = None;
    let mut language = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                audio = Some((file_name, bytes.to_vec()));
            }
            Some("language") => {
                language = normalize_language(Some(&field.text().await?));
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (file_name, audio) =
        audio.ok_or_else(|| ApiError::InputValidation("No audio file provided".to_string()))?;
    if audio.is_empty() {
        return Err(ApiError::InputValidation("Audio file is empty".to_string()));
    }

    Ok(AnalyzeForm {
        file_name,
        audio,
        language,
    })
}

async fn analyze_inner(
    state: AppState,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Result<AnalyzeResponse, ApiError> {
    let classifier = state.classifier.classifier()?;

    let multipart =
        multipart.map_err(|e| ApiError::InputValidation(format!("Invalid multipart body: {}", e.body_text())))?;
    let form = read_form(multipart).await?;

    let request_id = Uuid::new_v4().to_string();
    let language = form
        .language
        .clone()
        .unwrap_or_else(|| state.config.default_language.clone());
    info!(
        "[{}] Analyzing upload {:?} ({} bytes, language {})",
        request_id,
        form.file_name,
        form.audio.len(),
        language
    );

    let job = AnalyzeJob {
        request_id,
        temp_dir: state.config.temp_dir.clone(),
        loader: Arc::clone(&state.loader),
        classifier,
        emojis: Arc::clone(&state.emojis),
        transcriber: state.transcriber.clone(),
        emoji_top_k: state.config.emoji_top_k,
    };

    tokio::task::spawn_blocking(move || job.run(form, &language)).await?
}

/// Everything the blocking half of `/analyze` needs
struct AnalyzeJob {
    request_id: String,
    temp_dir: PathBuf,
    loader: Arc<AudioLoader>,
    classifier: Arc<EmotionClassifier>,
    emojis: Arc<EmojiMapper>,
    transcriber: Option<Arc<dyn Transcriber>>,
    emoji_top_k: usize,
}

impl AnalyzeJob {
    fn run(self, form: AnalyzeForm, language: &str) -> Result<AnalyzeResponse, ApiError> {
        let start = Instant::now();

        // Removed when `staged` drops, on success or error
        let staged = StagedUpload::stage(
            &self.temp_dir,
            &self.request_id,
            form.file_name.as_deref(),
            &form.audio,
        )?;
        drop(form);

        let signal = self.loader.load(staged.path())?;
        let features = extract_audio_features(&signal)?;
        let scores = self.classifier.classify(&signal)?;
        let suggested_emojis = self.emojis.suggest(scores.as_slice(), self.emoji_top_k);

        let transcription = match &self.transcriber {
            Some(transcriber) => match transcriber.transcribe(signal.samples(), Some(language)) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!("[{}] Transcription failed: {:#}", self.request_id, e);
                    String::new()
                }
            },
            None => String::new(),
        };

        info!(
            "[{}] Analysis complete in {:?}: {} -> {:?}",
            self.request_id,
            start.elapsed(),
            scores.top().map(|s| s.emotion.as_str()).unwrap_or("none"),
            suggested_emojis
        );

        Ok(AnalyzeResponse {
            success: true,
            transcription,
            emotion_scores: scores.top_k(ANALYZE_TOP_EMOTIONS).to_vec(),
            suggested_emojis,
            audio_features: features,
        })
    }
}
