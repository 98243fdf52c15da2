//! Mapping from pipeline failures to HTTP responses.

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::types::ErrorResponse;
use crate::audio::AudioError;
use crate::emotion::ClassifierError;
use crate::features::FeatureError;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Every failure a request can end in, one status code each
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InputValidation(String),

    #[error("{0}")]
    ResourceNotFound(String),

    #[error("Could not decode audio: {0}")]
    Decode(String),

    #[error("{0}")]
    TooShort(String),

    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Emotion model is not ready")]
    ModelNotReady,

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InputValidation(_)
            | Self::Decode(_)
            | Self::TooShort(_)
            | Self::FeatureExtraction(_) => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::Inference(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log internal failures and, unless `debug` is set, hide their detail.
    ///
    /// Only 500s are rewritten; 503 and every 4xx keep their status and text.
    pub fn for_client(self, debug: bool) -> Self {
        if !matches!(self, Self::Inference(_) | Self::Unexpected(_)) {
            return self;
        }
        error!("Request failed: {}", self);
        if debug {
            self
        } else {
            Self::Unexpected(INTERNAL_ERROR_MESSAGE.to_string())
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            success: false,
            error: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AudioError> for ApiError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::ResourceNotFound(format!("Audio file not found: {}", e))
            }
            AudioError::Io(e) => Self::Unexpected(format!("Audio I/O error: {}", e)),
            AudioError::Decode(msg) => Self::Decode(msg),
            err @ AudioError::TooShort { .. } => Self::TooShort(err.to_string()),
            AudioError::Resample(msg) => Self::Unexpected(format!("Resampling failed: {}", msg)),
        }
    }
}

impl From<FeatureError> for ApiError {
    fn from(err: FeatureError) -> Self {
        Self::FeatureExtraction(err.to_string())
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::ModelNotReady => Self::ModelNotReady,
            ClassifierError::Inference(msg) => Self::Inference(msg),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge(rejection.body_text());
        }
        Self::InputValidation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge(err.body_text());
        }
        Self::InputValidation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Give body-limit rejections from outer layers the same JSON shape as every
/// other error
pub async fn json_payload_too_large(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE || is_json {
        return response;
    }
    ApiError::PayloadTooLarge("Request body exceeds the upload size limit".to_string()).into_response()
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unexpected(format!("Pipeline task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::InputValidation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ResourceNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Decode("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::TooShort("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::FeatureExtraction("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::PayloadTooLarge("x".into()).status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::ModelNotReady.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::Inference("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Unexpected("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_module_errors_convert() {
        let too_short: ApiError = AudioError::TooShort { duration: 0.5, min: 1.0 }.into();
        assert_eq!(too_short.status(), StatusCode::BAD_REQUEST);

        let not_ready: ApiError = ClassifierError::ModelNotReady.into();
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);

        let features: ApiError = FeatureError::EmptySignal.into();
        assert_eq!(features.status(), StatusCode::BAD_REQUEST);

        let missing: ApiError =
            AudioError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_server_errors_redacted_without_debug() {
        let err = ApiError::Inference("tensor shape [1, 3] is wrong".into()).for_client(false);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), INTERNAL_ERROR_MESSAGE);

        let err = ApiError::Unexpected("disk on fire".into()).for_client(false);
        assert_eq!(err.client_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_not_ready_keeps_503_without_debug() {
        let err = ApiError::ModelNotReady.for_client(false);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.client_message(), "Emotion model is not ready");

        let err: ApiError = ClassifierError::ModelNotReady.into();
        assert_eq!(err.for_client(false).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_plain_413_rewritten_as_json() {
        let plain = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let response = json_payload_too_large(plain).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("application/json"));

        let ok = json_payload_too_large(StatusCode::OK.into_response()).await;
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[test]
    fn test_server_errors_kept_in_debug() {
        let err = ApiError::Unexpected("disk on fire".into()).for_client(true);
        assert_eq!(err.client_message(), "disk on fire");
    }

    #[test]
    fn test_client_errors_never_redacted() {
        let err = ApiError::InputValidation("audio_path is required".into()).for_client(false);
        assert_eq!(err.client_message(), "audio_path is required");
    }
}
