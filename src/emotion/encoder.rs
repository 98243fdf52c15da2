//! wav2vec2 sequence encoder running on ONNX Runtime.
//!
//! The exported graph takes normalised waveform `[batch, samples]` and returns
//! `last_hidden_state` as `[batch, frames, hidden]`.

use ndarray::Array2;
use std::path::Path;

#[cfg(feature = "classifier")]
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};

use super::ClassifierError;

/// Shortest input the convolutional front end accepts (one receptive field)
pub const MIN_INPUT_SAMPLES: usize = 400;

/// Produces per-frame hidden states for a prepared waveform
pub trait SequenceEncoder: Send {
    /// Encode `input` into a `(frames x hidden)` matrix
    fn encode(&mut self, input: &[f32]) -> Result<Array2<f32>, ClassifierError>;

    /// Name of the compute device, for health reporting
    fn device(&self) -> &str;
}

/// Zero-mean, unit-variance normalisation, zero-padded to `MIN_INPUT_SAMPLES`
pub fn prepare_input(samples: &[f32]) -> Vec<f32> {
    let n = samples.len().max(1) as f32;
    let mean = samples.iter().sum::<f32>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    let scale = 1.0 / (variance + 1e-7).sqrt();

    let mut prepared: Vec<f32> = samples.iter().map(|s| (s - mean) * scale).collect();
    if prepared.len() < MIN_INPUT_SAMPLES {
        prepared.resize(MIN_INPUT_SAMPLES, 0.0);
    }
    prepared
}

/// ONNX-backed wav2vec2 encoder
#[cfg(feature = "classifier")]
pub struct OnnxEncoder {
    session: Session,
}

#[cfg(feature = "classifier")]
impl OnnxEncoder {
    /// Load the encoder graph from `model_path`
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `n_threads` - Number of intra-op threads for inference
    pub fn new(model_path: &Path, n_threads: usize) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ClassifierError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ClassifierError::ModelLoad(e.to_string()))?
            .with_intra_threads(n_threads.max(1))
            .map_err(|e: ort::Error| ClassifierError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e: ort::Error| ClassifierError::ModelLoad(e.to_string()))?;

        tracing::info!("Loaded emotion encoder from {:?}", model_path);

        Ok(Self { session })
    }
}

#[cfg(feature = "classifier")]
impl SequenceEncoder for OnnxEncoder {
    fn encode(&mut self, input: &[f32]) -> Result<Array2<f32>, ClassifierError> {
        let input_shape = [1_usize, input.len()];

        let input_tensor = Value::from_array((input_shape, input.to_vec()))
            .map_err(|e: ort::Error| ClassifierError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e: ort::Error| ClassifierError::Inference(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifierError::Inference("No output from encoder".to_string()))?;

        let (shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e: ort::Error| ClassifierError::Inference(e.to_string()))?;

        // last_hidden_state: [batch, frames, hidden]
        if shape.len() != 3 || shape[0] != 1 {
            return Err(ClassifierError::Inference(format!(
                "Unexpected encoder output shape: {:?}",
                &shape[..]
            )));
        }
        let frames = shape[1] as usize;
        let hidden = shape[2] as usize;

        Array2::from_shape_vec((frames, hidden), data.to_vec())
            .map_err(|e| ClassifierError::Inference(e.to_string()))
    }

    fn device(&self) -> &str {
        "cpu"
    }
}

// Stub implementation when feature is not enabled
#[cfg(not(feature = "classifier"))]
pub struct OnnxEncoder;

#[cfg(not(feature = "classifier"))]
impl OnnxEncoder {
    pub fn new(_model_path: &Path, _n_threads: usize) -> Result<Self, ClassifierError> {
        Err(ClassifierError::FeatureNotEnabled)
    }
}

#[cfg(not(feature = "classifier"))]
impl SequenceEncoder for OnnxEncoder {
    fn encode(&mut self, _input: &[f32]) -> Result<Array2<f32>, ClassifierError> {
        Err(ClassifierError::FeatureNotEnabled)
    }

    fn device(&self) -> &str {
        "none"
    }
}
