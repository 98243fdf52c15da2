//! Centred framing and short-time magnitude spectra.

use realfft::num_complex::Complex;
use realfft::RealFftPlanner;
use std::f32::consts::PI;

use super::FeatureError;

/// FFT size and analysis frame length
pub const N_FFT: usize = 2048;

/// Hop between successive frames
pub const HOP_LENGTH: usize = 512;

/// Pad the signal with `n_fft / 2` zeros on each side so frame `t` is
/// centred on sample `t * hop`.
pub fn pad_centered(samples: &[f32], n_fft: usize) -> Vec<f32> {
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);
    padded
}

/// Number of centred frames for a signal of `len` samples
pub fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

/// Iterate over centred frames of `frame_length` samples
pub fn frames<'a>(
    padded: &'a [f32],
    n_frames: usize,
    frame_length: usize,
    hop: usize,
) -> impl Iterator<Item = &'a [f32]> + 'a {
    (0..n_frames).filter_map(move |t| {
        let start = t * hop;
        padded.get(start..start + frame_length)
    })
}

/// Periodic Hann window
pub fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / len as f32).cos()))
        .collect()
}

/// Magnitude spectrogram, `[frame][bin]` with `n_fft / 2 + 1` bins per frame
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub n_fft: usize,
}

impl Spectrogram {
    /// Compute the windowed STFT magnitude of `samples`
    pub fn compute(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Result<Self, FeatureError> {
        if samples.is_empty() {
            return Err(FeatureError::EmptySignal);
        }

        let window = hann_window(n_fft);
        let padded = pad_centered(samples, n_fft);
        let n_frames = frame_count(samples.len(), hop);

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut fft_input = fft.make_input_vec();
        let mut fft_output: Vec<Complex<f32>> = fft.make_output_vec();

        let mut out = Vec::with_capacity(n_frames);
        for frame in frames(&padded, n_frames, n_fft, hop) {
            for ((dst, &s), &w) in fft_input.iter_mut().zip(frame).zip(&window) {
                *dst = s * w;
            }

            fft.process(&mut fft_input, &mut fft_output)
                .map_err(|e| FeatureError::Spectrum(format!("FFT failed: {}", e)))?;

            out.push(fft_output.iter().map(|c| c.norm()).collect());
        }

        Ok(Self {
            frames: out,
            sample_rate,
            n_fft,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Centre frequency of FFT bin `bin` in Hz
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    /// Per-frame spectral centroid in Hz (0 for silent frames)
    pub fn centroids(&self) -> Vec<f32> {
        self.frames
            .iter()
            .map(|mags| {
                let total: f32 = mags.iter().sum();
                if total <= f32::EPSILON {
                    return 0.0;
                }
                mags.iter()
                    .enumerate()
                    .map(|(bin, &m)| self.bin_frequency(bin) * m)
                    .sum::<f32>()
                    / total
            })
            .collect()
    }

    /// Per-frame frequency below which `percent` of the magnitude lies
    pub fn rolloffs(&self, percent: f32) -> Vec<f32> {
        self.frames
            .iter()
            .map(|mags| {
                let total: f32 = mags.iter().sum();
                let threshold = percent * total;
                let mut cumulative = 0.0f32;
                for (bin, &m) in mags.iter().enumerate() {
                    cumulative += m;
                    if cumulative >= threshold {
                        return self.bin_frequency(bin);
                    }
                }
                self.bin_frequency(mags.len().saturating_sub(1))
            })
            .collect()
    }
}
