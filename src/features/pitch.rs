//! Peak-picking pitch tracker over the magnitude spectrogram.
//!
//! ## Algorithm
//! 1. For each frame, keep bins inside the search band that are local maxima
//!    and exceed `THRESHOLD` times the frame's peak magnitude
//! 2. Refine each candidate's frequency with parabolic interpolation
//! 3. The frame's pitch is the candidate with the largest magnitude
//! 4. Frames without a candidate are unvoiced

use super::spectrum::Spectrogram;

/// Lowest frequency considered (Hz)
pub const FMIN: f32 = 150.0;

/// Highest frequency considered (Hz)
pub const FMAX: f32 = 4000.0;

/// Candidate bins must exceed this fraction of the frame maximum
const THRESHOLD: f32 = 0.1;

/// Dominant frequency for each frame, `None` for unvoiced frames
pub fn track(spec: &Spectrogram) -> Vec<Option<f32>> {
    let n_bins = spec.n_bins();
    let bin_hz = spec.sample_rate as f32 / spec.n_fft as f32;
    let lo = ((FMIN / bin_hz).ceil() as usize).max(1);
    let hi = ((FMAX / bin_hz).floor() as usize).min(n_bins.saturating_sub(2));

    spec.frames
        .iter()
        .map(|mags| frame_pitch(mags, lo, hi, bin_hz))
        .collect()
}

fn frame_pitch(mags: &[f32], lo: usize, hi: usize, bin_hz: f32) -> Option<f32> {
    let peak = mags.iter().copied().fold(0.0f32, f32::max);
    let threshold = THRESHOLD * peak;

    let mut best: Option<(f32, f32)> = None;
    for i in lo..=hi {
        let (prev, cur, next) = (mags[i - 1], mags[i], mags[i + 1]);
        if cur <= threshold || cur <= prev || cur < next {
            continue;
        }

        let avg = 0.5 * (next - prev);
        let curvature = 2.0 * cur - next - prev;
        let shift = if curvature.abs() > f32::EPSILON { avg / curvature } else { 0.0 };
        let magnitude = cur + 0.5 * avg * shift;
        let frequency = (i as f32 + shift) * bin_hz;

        if best.map_or(true, |(m, _)| magnitude > m) {
            best = Some((magnitude, frequency));
        }
    }

    best.map(|(_, f)| f).filter(|&f| f > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn spectrogram(samples: &[f32]) -> Spectrogram {
        Spectrogram::compute(samples, 16000, 2048, 512).unwrap()
    }

    #[test]
    fn test_pure_tone_pitch() {
        let samples: Vec<f32> = (0..16000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 16000.0).sin() * 0.5)
            .collect();
        let pitches = track(&spectrogram(&samples));
        let voiced: Vec<f32> = pitches.iter().flatten().copied().collect();

        assert!(voiced.len() > pitches.len() / 2);
        let middle = voiced[voiced.len() / 2];
        assert!((middle - 440.0).abs() < 10.0, "Expected ~440 Hz, got {}", middle);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let pitches = track(&spectrogram(&vec![0.0; 16000]));
        assert!(pitches.iter().all(Option::is_none));
    }

    #[test]
    fn test_tone_below_band_is_ignored() {
        let samples: Vec<f32> = (0..16000)
            .map(|i| (2.0 * PI * 60.0 * i as f32 / 16000.0).sin() * 0.5)
            .collect();
        let pitches = track(&spectrogram(&samples));
        for p in pitches.iter().flatten() {
            assert!(*p >= FMIN - 10.0, "Pitch {} below search band", p);
        }
    }
}
