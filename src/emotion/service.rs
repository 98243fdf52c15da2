//! Process-wide classifier lifecycle.
//!
//! ```text
//! Uninitialized -> Loading -> Ready
//!                          \-> FailedInit
//! ```
//!
//! `Ready` and `FailedInit` are terminal. Only `Ready` hands out the
//! classifier; every other state answers `ModelNotReady`.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{error, info};

use super::classifier::EmotionClassifier;
use super::encoder::{OnnxEncoder, SequenceEncoder};
use super::head::HeadCheckpoint;
use super::labels::parse_labels;
use super::pooling::PoolingMode;
use super::ClassifierError;

/// Where the classifier's files live and how to assemble it
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub encoder_path: PathBuf,
    pub head_path: PathBuf,
    pub labels: Vec<String>,
    /// Takes precedence over the checkpoint's own pooling mode
    pub pooling_mode: Option<String>,
    pub sample_rate: u32,
    pub n_threads: usize,
}

/// Load the head checkpoint, validate it against the configured labels and
/// build a classifier around `encoder`.
pub fn build_classifier(
    config: &ClassifierConfig,
    encoder: Box<dyn SequenceEncoder>,
) -> Result<EmotionClassifier, ClassifierError> {
    let labels = parse_labels(&config.labels)?;
    let checkpoint = HeadCheckpoint::load(&config.head_path)?;

    let checkpoint_labels = parse_labels(&checkpoint.labels)?;
    if checkpoint_labels != labels {
        return Err(ClassifierError::LabelMismatch(format!(
            "Checkpoint labels {:?} differ from configured labels {:?}",
            checkpoint.labels, config.labels
        )));
    }

    let pooling = match config.pooling_mode.as_deref().or(checkpoint.pooling_mode.as_deref()) {
        Some(mode) => mode.parse::<PoolingMode>()?,
        None => PoolingMode::default(),
    };

    info!(
        "Classifier head: hidden_size={}, labels={}, pooling={}",
        checkpoint.head.hidden_size(),
        labels.len(),
        pooling
    );

    EmotionClassifier::new(encoder, checkpoint.head, pooling, labels, config.sample_rate)
}

/// Load the ONNX encoder and head from disk
pub fn load_classifier(config: &ClassifierConfig) -> Result<EmotionClassifier, ClassifierError> {
    let encoder = OnnxEncoder::new(&config.encoder_path, config.n_threads)?;
    build_classifier(config, Box::new(encoder))
}

/// Lifecycle state of the process-wide classifier
pub enum ModelState {
    Uninitialized,
    Loading,
    Ready(Arc<EmotionClassifier>),
    FailedInit(String),
}

impl ModelState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::FailedInit(_) => "failed",
        }
    }
}

/// Snapshot of the classifier state for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub state: &'static str,
    pub ready: bool,
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Owner of the classifier lifecycle, shared by every request handler
pub struct ClassifierService {
    state: RwLock<ModelState>,
}

impl Default for ClassifierService {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierService {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ModelState::Uninitialized),
        }
    }

    /// A service that is already `Ready` with `classifier`
    pub fn ready(classifier: EmotionClassifier) -> Self {
        Self {
            state: RwLock::new(ModelState::Ready(Arc::new(classifier))),
        }
    }

    /// `Uninitialized -> Loading`
    pub fn begin_loading(&self) -> Result<(), ClassifierError> {
        let mut state = self.write_state()?;
        match *state {
            ModelState::Uninitialized => {
                *state = ModelState::Loading;
                info!("Emotion classifier loading");
                Ok(())
            }
            ref other => Err(ClassifierError::ModelLoad(format!(
                "Cannot start loading from state '{}'",
                other.name()
            ))),
        }
    }

    /// `Loading -> Ready` on success, `Loading -> FailedInit` on error.
    ///
    /// The load error is handed back so the caller can abort startup.
    pub fn finish_loading(
        &self,
        result: Result<EmotionClassifier, ClassifierError>,
    ) -> Result<(), ClassifierError> {
        let mut state = self.write_state()?;
        if !matches!(*state, ModelState::Loading) {
            return Err(ClassifierError::ModelLoad(format!(
                "Cannot finish loading from state '{}'",
                state.name()
            )));
        }

        match result {
            Ok(classifier) => {
                info!(
                    "Emotion classifier ready on {} ({} labels, {} pooling)",
                    classifier.device(),
                    classifier.labels().len(),
                    classifier.pooling()
                );
                *state = ModelState::Ready(Arc::new(classifier));
                Ok(())
            }
            Err(e) => {
                error!("Emotion classifier failed to load: {}", e);
                *state = ModelState::FailedInit(e.to_string());
                Err(e)
            }
        }
    }

    /// Run `load` through the full `Uninitialized -> Loading -> Ready` sequence
    pub fn load_with<F>(&self, load: F) -> Result<(), ClassifierError>
    where
        F: FnOnce() -> Result<EmotionClassifier, ClassifierError>,
    {
        self.begin_loading()?;
        self.finish_loading(load())
    }

    /// The classifier, if `Ready`
    pub fn classifier(&self) -> Result<Arc<EmotionClassifier>, ClassifierError> {
        let state = self.state.read().map_err(|_| ClassifierError::ModelNotReady)?;
        match &*state {
            ModelState::Ready(classifier) => Ok(Arc::clone(classifier)),
            _ => Err(ClassifierError::ModelNotReady),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.classifier().is_ok()
    }

    pub fn status(&self) -> ModelStatus {
        match self.state.read() {
            Ok(state) => match &*state {
                ModelState::Ready(classifier) => ModelStatus {
                    state: state.name(),
                    ready: true,
                    device: Some(classifier.device().to_string()),
                    error: None,
                },
                ModelState::FailedInit(reason) => ModelStatus {
                    state: state.name(),
                    ready: false,
                    device: None,
                    error: Some(reason.clone()),
                },
                other => ModelStatus {
                    state: other.name(),
                    ready: false,
                    device: None,
                    error: None,
                },
            },
            Err(_) => ModelStatus {
                state: "poisoned",
                ready: false,
                device: None,
                error: None,
            },
        }
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, ModelState>, ClassifierError> {
        self.state
            .write()
            .map_err(|_| ClassifierError::ModelLoad("Classifier state lock poisoned".to_string()))
    }
}
