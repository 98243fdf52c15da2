//! Audio loading for the emotion pipeline.
//!
//! Every file entering the pipeline is decoded, down-mixed to mono and
//! resampled to [`TARGET_SAMPLE_RATE`] before anything else looks at it.

pub mod loader;
pub mod resampler;
pub mod staging;

pub use loader::{AudioLoader, LoaderConfig};
pub use resampler::{AudioResampler, TARGET_SAMPLE_RATE};
pub use staging::StagedUpload;

use thiserror::Error;

/// Errors that can occur while loading audio
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not decode audio: {0}")]
    Decode(String),

    #[error("Audio too short: {duration:.2}s (minimum {min:.2}s)")]
    TooShort { duration: f32, min: f32 },

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Mono audio at a known sample rate
#[derive(Debug, Clone)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (sample count / sample rate)
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Keep only the first `max_samples` samples
    pub fn truncate(&mut self, max_samples: usize) {
        self.samples.truncate(max_samples);
    }
}

/// Average interleaved frames down to a single channel
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
