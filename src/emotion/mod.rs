//! Speech emotion recognition.
//!
//! A pretrained wav2vec2 encoder turns the waveform into per-frame hidden
//! states; those are pooled, passed through a small classification head and
//! normalised into a probability distribution over [`Emotion`] labels.

pub mod classifier;
pub mod encoder;
pub mod head;
pub mod labels;
pub mod pooling;
pub mod service;

pub use classifier::{softmax, EmotionClassifier, EmotionScore, ScoreList};
pub use encoder::{OnnxEncoder, SequenceEncoder};
pub use head::{ClassificationHead, HeadCheckpoint, Linear};
pub use labels::{parse_labels, Emotion, LabelScores};
pub use pooling::PoolingMode;
pub use service::{ClassifierService, ModelState, ModelStatus};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or running the classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model not found at path: {0}")]
    ModelNotFound(PathBuf),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Invalid checkpoint: {0}")]
    Checkpoint(String),

    #[error("Label set mismatch: {0}")]
    LabelMismatch(String),

    #[error("Invalid pooling mode '{0}': must be one of mean, sum, max")]
    InvalidPoolingMode(String),

    #[error("Emotion model is not ready")]
    ModelNotReady,

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Feature not enabled: the classifier requires the 'classifier' feature")]
    FeatureNotEnabled,
}
