//! Frame pooling: collapse `(frames x hidden)` encoder output to one vector.

use ndarray::{Array1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ClassifierError;

/// Reduction applied across the frame axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolingMode {
    #[default]
    Mean,
    Sum,
    Max,
}

impl PoolingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Max => "max",
        }
    }

    /// Pool `hidden` over its first (frame) axis
    pub fn pool(&self, hidden: ArrayView2<f32>) -> Result<Array1<f32>, ClassifierError> {
        if hidden.nrows() == 0 {
            return Err(ClassifierError::Inference(
                "Encoder returned no frames".to_string(),
            ));
        }

        let pooled = match self {
            Self::Mean => hidden
                .mean_axis(Axis(0))
                .ok_or_else(|| ClassifierError::Inference("Mean over empty axis".to_string()))?,
            Self::Sum => hidden.sum_axis(Axis(0)),
            Self::Max => hidden.fold_axis(Axis(0), f32::NEG_INFINITY, |acc, &x| acc.max(x)),
        };
        Ok(pooled)
    }
}

impl fmt::Display for PoolingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PoolingMode {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            "max" => Ok(Self::Max),
            other => Err(ClassifierError::InvalidPoolingMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    const MODES: [PoolingMode; 3] = [PoolingMode::Mean, PoolingMode::Sum, PoolingMode::Max];

    #[test]
    fn test_pool_modes() {
        let hidden = array![[1.0f32, -2.0, 3.0], [3.0, 0.0, -1.0]];
        assert_eq!(PoolingMode::Mean.pool(hidden.view()).unwrap(), array![2.0, -1.0, 1.0]);
        assert_eq!(PoolingMode::Sum.pool(hidden.view()).unwrap(), array![4.0, -2.0, 2.0]);
        assert_eq!(PoolingMode::Max.pool(hidden.view()).unwrap(), array![3.0, 0.0, 3.0]);
    }

    #[test]
    fn test_unknown_mode_fails() {
        for bad in ["median", "MEAN", "", "attention"] {
            assert!(matches!(
                bad.parse::<PoolingMode>(),
                Err(ClassifierError::InvalidPoolingMode(_))
            ));
        }
    }

    #[test]
    fn test_parse_known_modes() {
        for mode in MODES {
            assert_eq!(mode.as_str().parse::<PoolingMode>().unwrap(), mode);
        }
        assert_eq!(PoolingMode::default(), PoolingMode::Mean);
    }

    #[test]
    fn test_empty_frames_is_inference_error() {
        let hidden = Array2::<f32>::zeros((0, 4));
        for mode in MODES {
            assert!(matches!(mode.pool(hidden.view()), Err(ClassifierError::Inference(_))));
        }
    }

    proptest! {
        #[test]
        fn prop_single_frame_is_identity(
            frame in proptest::collection::vec(-100.0f32..100.0, 1..64)
        ) {
            let d = frame.len();
            let hidden = Array2::from_shape_vec((1, d), frame.clone()).unwrap();
            for mode in MODES {
                let pooled = mode.pool(hidden.view()).unwrap();
                prop_assert_eq!(pooled.to_vec(), frame.clone());
            }
        }
    }
}
