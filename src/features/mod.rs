//! Classical acoustic descriptors for diagnostics.
//!
//! These measurements are reported alongside the emotion scores; the neural
//! classifier does not consume them. Extraction is a pure function of the
//! signal, so it is safe to run from any number of threads at once.

pub mod mel;
pub mod pitch;
pub mod spectrum;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::audio::AudioSignal;
use mel::{N_MELS, N_MFCC};
use spectrum::{frame_count, frames, pad_centered, Spectrogram, HOP_LENGTH, N_FFT};

/// Fraction of spectral magnitude below the rolloff frequency
pub const ROLLOFF_PERCENT: f32 = 0.85;

/// Errors that can occur during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Signal is empty")]
    EmptySignal,

    #[error("Spectrum computation failed: {0}")]
    Spectrum(String),

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Fixed set of acoustic measurements for one clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub mfcc_mean: [f32; N_MFCC],
    pub mfcc_std: [f32; N_MFCC],
    /// Mean of voiced-frame pitch in Hz (0.0 when nothing is voiced)
    pub pitch_mean: f32,
    pub pitch_std: f32,
    /// Mean of per-frame RMS amplitude
    pub energy_mean: f32,
    pub energy_std: f32,
    pub spectral_centroid: f32,
    pub spectral_rolloff: f32,
    pub zero_crossing_rate: f32,
    /// Seconds, from sample count and rate
    pub duration: f32,
}

impl FeatureVector {
    fn check_finite(&self) -> Result<(), FeatureError> {
        let scalars = [
            ("pitch_mean", self.pitch_mean),
            ("pitch_std", self.pitch_std),
            ("energy_mean", self.energy_mean),
            ("energy_std", self.energy_std),
            ("spectral_centroid", self.spectral_centroid),
            ("spectral_rolloff", self.spectral_rolloff),
            ("zero_crossing_rate", self.zero_crossing_rate),
            ("duration", self.duration),
        ];
        if let Some((name, _)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FeatureError::NonFinite(name));
        }
        if !self.mfcc_mean.iter().all(|v| v.is_finite()) {
            return Err(FeatureError::NonFinite("mfcc_mean"));
        }
        if !self.mfcc_std.iter().all(|v| v.is_finite()) {
            return Err(FeatureError::NonFinite("mfcc_std"));
        }
        Ok(())
    }
}

/// Population mean and standard deviation; (0, 0) for an empty slice
pub fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    (mean, variance.sqrt())
}

/// Per-frame RMS amplitude over centred, unwindowed frames
fn frame_rms(samples: &[f32]) -> Vec<f32> {
    let padded = pad_centered(samples, N_FFT);
    let n_frames = frame_count(samples.len(), HOP_LENGTH);
    frames(&padded, n_frames, N_FFT, HOP_LENGTH)
        .map(|frame| (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt())
        .collect()
}

/// Per-frame fraction of adjacent sample pairs that change sign (zero counts as positive)
fn frame_zcr(samples: &[f32]) -> Vec<f32> {
    let padded = pad_centered(samples, N_FFT);
    let n_frames = frame_count(samples.len(), HOP_LENGTH);
    frames(&padded, n_frames, N_FFT, HOP_LENGTH)
        .map(|frame| {
            let crossings = frame
                .windows(2)
                .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
                .count();
            crossings as f32 / frame.len() as f32
        })
        .collect()
}

/// Compute the full [`FeatureVector`] for `signal`
pub fn extract_audio_features(signal: &AudioSignal) -> Result<FeatureVector, FeatureError> {
    let samples = signal.samples();
    if samples.is_empty() || signal.sample_rate() == 0 {
        return Err(FeatureError::EmptySignal);
    }

    let start = std::time::Instant::now();
    let spec = Spectrogram::compute(samples, signal.sample_rate(), N_FFT, HOP_LENGTH)?;

    let coefficients = mel::mfcc(&spec, N_MELS, N_MFCC);
    let mut mfcc_mean = [0.0f32; N_MFCC];
    let mut mfcc_std = [0.0f32; N_MFCC];
    for k in 0..N_MFCC {
        let column: Vec<f32> = coefficients.iter().map(|frame| frame[k]).collect();
        let (mean, std) = mean_std(&column);
        mfcc_mean[k] = mean;
        mfcc_std[k] = std;
    }

    let voiced: Vec<f32> = pitch::track(&spec).into_iter().flatten().collect();
    let (pitch_mean, pitch_std) = mean_std(&voiced);

    let (energy_mean, energy_std) = mean_std(&frame_rms(samples));
    let (spectral_centroid, _) = mean_std(&spec.centroids());
    let (spectral_rolloff, _) = mean_std(&spec.rolloffs(ROLLOFF_PERCENT));
    let (zero_crossing_rate, _) = mean_std(&frame_zcr(samples));

    let features = FeatureVector {
        mfcc_mean,
        mfcc_std,
        pitch_mean,
        pitch_std,
        energy_mean,
        energy_std,
        spectral_centroid,
        spectral_rolloff,
        zero_crossing_rate,
        duration: signal.duration_secs(),
    };
    features.check_finite()?;

    debug!(
        "Extracted features in {:?}: {} frames, {} voiced",
        start.elapsed(),
        spec.frames.len(),
        voiced.len()
    );

    Ok(features)
}
