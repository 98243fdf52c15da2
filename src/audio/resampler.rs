use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use super::AudioError;

/// Canonical sample rate for feature extraction and the emotion encoder
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Chunk size fed to the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Whole-buffer resampler from a source rate to a target rate
pub struct AudioResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    input_frames: usize,
    source_rate: u32,
    target_rate: u32,
}

impl AudioResampler {
    /// Create a resampler from `source_rate` to `target_rate` (mono)
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, AudioError> {
        debug!(
            "Creating resampler: {} Hz -> {} Hz (ratio: {:.4})",
            source_rate,
            target_rate,
            target_rate as f64 / source_rate as f64
        );

        let resampler = FftFixedIn::new(
            source_rate as usize,
            target_rate as usize,
            CHUNK_FRAMES,
            2, // sub_chunks for quality
            1,
        )
        .map_err(|e| AudioError::Resample(e.to_string()))?;

        let input_buffer = vec![vec![0.0f32; CHUNK_FRAMES]; 1];
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_frames: CHUNK_FRAMES,
            source_rate,
            target_rate,
        })
    }

    /// Number of output samples a clip of `input_len` samples maps to
    pub fn expected_output_len(&self, input_len: usize) -> usize {
        (input_len as f64 * self.target_rate as f64 / self.source_rate as f64).round() as usize
    }

    /// Process exactly one chunk of `CHUNK_FRAMES` samples
    fn process_chunk(&mut self, input: &[f32]) -> Result<&[f32], AudioError> {
        self.input_buffer[0].copy_from_slice(input);

        let (_, output_frames) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

        Ok(&self.output_buffer[0][..output_frames])
    }

    /// Resample a complete clip.
    ///
    /// The tail is zero-padded to flush the filter, the resampler's output
    /// delay is dropped, and the result is cut to the exact expected length.
    pub fn process_all(&mut self, input: &[f32]) -> Result<Vec<f32>, AudioError> {
        let expected = self.expected_output_len(input.len());
        let delay = self.resampler.output_delay();
        let wanted = expected + delay;

        let mut output = Vec::with_capacity(wanted + CHUNK_FRAMES);
        let mut chunk = vec![0.0f32; self.input_frames];
        let mut pos = 0;

        while output.len() < wanted {
            chunk.fill(0.0);
            if pos < input.len() {
                let end = (pos + self.input_frames).min(input.len());
                chunk[..end - pos].copy_from_slice(&input[pos..end]);
            }
            let produced = self.process_chunk(&chunk)?;
            output.extend_from_slice(produced);
            pos += self.input_frames;
        }

        output.drain(..delay.min(output.len()));
        output.truncate(expected);
        self.resampler.reset();
        Ok(output)
    }
}
