//! Mel filterbank and cepstral coefficients.

use std::f32::consts::PI;

use super::spectrum::Spectrogram;

/// Number of mel bands feeding the DCT
pub const N_MELS: usize = 128;

/// Number of cepstral coefficients kept per frame
pub const N_MFCC: usize = 13;

/// Floor applied before taking the log of mel power
const AMIN: f32 = 1e-10;

/// Dynamic range kept below the loudest mel bin
const TOP_DB: f32 = 80.0;

/// Hz per mel in the linear region of the Slaney scale
const MEL_F_SP: f32 = 200.0 / 3.0;

/// Where the Slaney scale turns logarithmic
const MEL_LOG_MIN_HZ: f32 = 1000.0;
const MEL_LOG_MIN: f32 = MEL_LOG_MIN_HZ / MEL_F_SP;

/// ln(6.4) / 27: mel step per log-frequency unit above 1 kHz
fn mel_logstep() -> f32 {
    6.4f32.ln() / 27.0
}

/// Slaney (Auditory Toolbox) mel scale: linear below 1 kHz, log above
fn hz_to_mel(hz: f32) -> f32 {
    if hz < MEL_LOG_MIN_HZ {
        hz / MEL_F_SP
    } else {
        MEL_LOG_MIN + (hz / MEL_LOG_MIN_HZ).ln() / mel_logstep()
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    if mel < MEL_LOG_MIN {
        mel * MEL_F_SP
    } else {
        MEL_LOG_MIN_HZ * (mel_logstep() * (mel - MEL_LOG_MIN)).exp()
    }
}

/// Create a mel filterbank matrix on the Slaney scale
///
/// Triangles are area-normalised (each scaled by `2 / bandwidth_hz`), so every
/// filter integrates to one over frequency.
///
/// # Returns
/// Vec of mel filters, each filter is a Vec of weights for FFT bins
pub fn create_mel_filterbank(
    n_mels: usize,
    n_fft_bins: usize,
    sample_rate: f32,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);

    // n_mels + 2 equally spaced points in mel scale
    let hz_points: Vec<f32> = (0..=n_mels + 1)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * (i as f32) / ((n_mels + 1) as f32)))
        .collect();

    let bin_hz = |bin: usize| bin as f32 * (sample_rate / 2.0) / (n_fft_bins as f32 - 1.0);

    let mut filterbank = Vec::with_capacity(n_mels);

    for i in 0..n_mels {
        let left = hz_points[i];
        let center = hz_points[i + 1];
        let right = hz_points[i + 2];
        let norm = 2.0 / (right - left);

        let filter: Vec<f32> = (0..n_fft_bins)
            .map(|bin| {
                let f = bin_hz(bin);
                let rising = (f - left) / (center - left);
                let falling = (right - f) / (right - center);
                rising.min(falling).max(0.0) * norm
            })
            .collect();

        filterbank.push(filter);
    }

    filterbank
}

/// `10 * log10(max(power, amin))`, clipped to `top_db` below the peak
pub fn power_to_db(power: &mut [Vec<f32>]) {
    let mut peak = f32::NEG_INFINITY;
    for v in power.iter_mut().flat_map(|frame| frame.iter_mut()) {
        *v = 10.0 * v.max(AMIN).log10();
        peak = peak.max(*v);
    }
    let floor = peak - TOP_DB;
    for v in power.iter_mut().flat_map(|frame| frame.iter_mut()) {
        *v = v.max(floor);
    }
}

/// Orthonormal DCT-II of `input`, keeping the first `n_out` coefficients
pub fn dct_ortho(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len() as f32;
    (0..n_out)
        .map(|k| {
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

/// MFCCs per frame, `[frame][coefficient]`
pub fn mfcc(spec: &Spectrogram, n_mels: usize, n_mfcc: usize) -> Vec<Vec<f32>> {
    let filterbank = create_mel_filterbank(
        n_mels,
        spec.n_bins(),
        spec.sample_rate as f32,
        0.0,
        spec.sample_rate as f32 / 2.0,
    );

    let mut mel_power: Vec<Vec<f32>> = spec
        .frames
        .iter()
        .map(|mags| {
            filterbank
                .iter()
                .map(|filter| filter.iter().zip(mags).map(|(w, m)| w * m * m).sum())
                .collect()
        })
        .collect();

    power_to_db(&mut mel_power);

    mel_power.iter().map(|frame| dct_ortho(frame, n_mfcc)).collect()
}
