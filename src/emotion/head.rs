//! Classification head and its on-disk checkpoint.
//!
//! The head is `dense (H -> H) -> tanh -> out_proj (H -> L)`. Dropout layers
//! from training are identity at inference and are not represented.
//!
//! ## Checkpoint schema
//!
//! ```json
//! {
//!   "schema_version": 2,
//!   "labels": ["angry", "calm", ...],
//!   "hidden_size": 1024,
//!   "pooling_mode": "mean",
//!   "dense":    { "weight": [[...], ...], "bias": [...] },
//!   "out_proj": { "weight": [[...], ...], "bias": [...] }
//! }
//! ```
//!
//! Weights use `nn.Linear` layout (`out x in`). Version 1 checkpoints name
//! the final projection `output` instead of `out_proj`; the tensors are the
//! same.

use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;
use std::path::Path;

use super::ClassifierError;

/// Newest checkpoint schema this build reads
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 2;

/// A dense layer, `y = W x + b`
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self, ClassifierError> {
        if weight.nrows() != bias.len() {
            return Err(ClassifierError::Checkpoint(format!(
                "Bias length {} does not match {} output rows",
                bias.len(),
                weight.nrows()
            )));
        }
        Ok(Self { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
        self.weight.dot(&x) + &self.bias
    }
}

/// `dense -> tanh -> out_proj`, producing raw logits
#[derive(Debug, Clone)]
pub struct ClassificationHead {
    dense: Linear,
    out_proj: Linear,
}

impl ClassificationHead {
    pub fn new(dense: Linear, out_proj: Linear) -> Result<Self, ClassifierError> {
        if dense.in_features() != dense.out_features() {
            return Err(ClassifierError::Checkpoint(format!(
                "Dense layer must be square, got {}x{}",
                dense.out_features(),
                dense.in_features()
            )));
        }
        if out_proj.in_features() != dense.out_features() {
            return Err(ClassifierError::Checkpoint(format!(
                "Output projection expects {} inputs, dense layer produces {}",
                out_proj.in_features(),
                dense.out_features()
            )));
        }
        Ok(Self { dense, out_proj })
    }

    pub fn hidden_size(&self) -> usize {
        self.dense.in_features()
    }

    pub fn num_labels(&self) -> usize {
        self.out_proj.out_features()
    }

    pub fn forward(&self, pooled: ArrayView1<f32>) -> Result<Array1<f32>, ClassifierError> {
        if pooled.len() != self.hidden_size() {
            return Err(ClassifierError::Inference(format!(
                "Pooled vector has {} features, head expects {}",
                pooled.len(),
                self.hidden_size()
            )));
        }
        let hidden = self.dense.forward(pooled).mapv(f32::tanh);
        Ok(self.out_proj.forward(hidden.view()))
    }
}

#[derive(Debug, Deserialize)]
struct LinearRecord {
    weight: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl LinearRecord {
    fn into_linear(self, name: &str) -> Result<Linear, ClassifierError> {
        let rows = self.weight.len();
        let cols = self.weight.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(ClassifierError::Checkpoint(format!("{}.weight is empty", name)));
        }
        if self.weight.iter().any(|row| row.len() != cols) {
            return Err(ClassifierError::Checkpoint(format!("{}.weight is ragged", name)));
        }
        let flat: Vec<f32> = self.weight.into_iter().flatten().collect();
        let weight = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| ClassifierError::Checkpoint(format!("{}.weight: {}", name, e)))?;
        Linear::new(weight, Array1::from(self.bias))
            .map_err(|e| ClassifierError::Checkpoint(format!("{}: {}", name, e)))
    }
}

#[derive(Debug, Deserialize)]
struct CheckpointRecord {
    schema_version: u32,
    labels: Vec<String>,
    hidden_size: usize,
    #[serde(default)]
    pooling_mode: Option<String>,
    dense: LinearRecord,
    #[serde(default)]
    out_proj: Option<LinearRecord>,
    #[serde(default)]
    output: Option<LinearRecord>,
}

/// A loaded, shape-checked head checkpoint
#[derive(Debug, Clone)]
pub struct HeadCheckpoint {
    pub labels: Vec<String>,
    /// Unparsed so configuration can override it before validation
    pub pooling_mode: Option<String>,
    pub head: ClassificationHead,
}

impl HeadCheckpoint {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::ModelNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::ModelLoad(format!("{:?}: {}", path, e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ClassifierError> {
        let record: CheckpointRecord = serde_json::from_str(content)
            .map_err(|e| ClassifierError::Checkpoint(format!("Invalid checkpoint JSON: {}", e)))?;

        let projection = match record.schema_version {
            1 => record.output.ok_or_else(|| {
                ClassifierError::Checkpoint("Schema 1 checkpoint is missing `output`".to_string())
            })?,
            2 => record.out_proj.ok_or_else(|| {
                ClassifierError::Checkpoint("Schema 2 checkpoint is missing `out_proj`".to_string())
            })?,
            other => {
                return Err(ClassifierError::Checkpoint(format!(
                    "Unsupported checkpoint schema {} (newest supported: {})",
                    other, CHECKPOINT_SCHEMA_VERSION
                )))
            }
        };

        let head = ClassificationHead::new(
            record.dense.into_linear("dense")?,
            projection.into_linear("out_proj")?,
        )?;

        if head.hidden_size() != record.hidden_size {
            return Err(ClassifierError::Checkpoint(format!(
                "hidden_size is {} but dense layer is {}x{}",
                record.hidden_size,
                head.hidden_size(),
                head.hidden_size()
            )));
        }
        if head.num_labels() != record.labels.len() {
            return Err(ClassifierError::LabelMismatch(format!(
                "Checkpoint lists {} labels but projects to {} logits",
                record.labels.len(),
                head.num_labels()
            )));
        }

        Ok(Self {
            labels: record.labels,
            pooling_mode: record.pooling_mode,
            head,
        })
    }
}
