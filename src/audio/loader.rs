//! File decoding and duration policy.
//!
//! Decoding goes through symphonia's probe so any container/codec it knows
//! (WAV, FLAC, MP3, OGG/Vorbis, MKV/WebM, MP4/AAC) is accepted.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::resampler::{AudioResampler, TARGET_SAMPLE_RATE};
use super::{downmix_to_mono, AudioError, AudioSignal};

/// Duration bounds and canonical rate for loaded audio
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub sample_rate: u32,
    /// Shorter clips fail with `TooShort`
    pub min_duration_secs: f32,
    /// Longer clips are cut to this length
    pub max_duration_secs: f32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            min_duration_secs: 1.0,
            max_duration_secs: 60.0,
        }
    }
}

/// Decodes audio files into canonical mono signals
#[derive(Debug, Clone, Default)]
pub struct AudioLoader {
    config: LoaderConfig,
}

impl AudioLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Decode `path`, down-mix, resample and apply the duration policy
    pub fn load(&self, path: &Path) -> Result<AudioSignal, AudioError> {
        let (interleaved, source_rate, channels) = decode_file(path)?;
        let mono = downmix_to_mono(&interleaved, channels);

        debug!(
            "Decoded {:?}: {} samples, {} Hz, {} channel(s)",
            path,
            mono.len(),
            source_rate,
            channels
        );

        let samples = if source_rate == self.config.sample_rate {
            mono
        } else {
            AudioResampler::new(source_rate, self.config.sample_rate)?.process_all(&mono)?
        };

        self.finalize(AudioSignal::new(samples, self.config.sample_rate))
    }

    /// Apply the min/max duration policy to an already-canonical signal
    pub fn finalize(&self, mut signal: AudioSignal) -> Result<AudioSignal, AudioError> {
        let duration = signal.duration_secs();
        if duration < self.config.min_duration_secs {
            return Err(AudioError::TooShort {
                duration,
                min: self.config.min_duration_secs,
            });
        }

        let max_samples = self.max_samples();
        if signal.len() > max_samples {
            warn!(
                "Audio is {:.2}s, truncating to {:.2}s",
                duration, self.config.max_duration_secs
            );
            signal.truncate(max_samples);
        }

        Ok(signal)
    }

    /// `max_duration_secs * sample_rate`, in samples
    pub fn max_samples(&self) -> usize {
        (self.config.max_duration_secs as f64 * self.config.sample_rate as f64).floor() as usize
    }
}

/// Decode the first audio track of a file into interleaved f32 samples
fn decode_file(path: &Path) -> Result<(Vec<f32>, u32, usize), AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("No audio track found".to_string()))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("Unknown sample rate".to_string()))?;

    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if sample_rate == 0 {
        return Err(AudioError::Decode("Sample rate is zero".to_string()));
    }

    Ok((samples, sample_rate, channels.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::tempdir;

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_load_canonical_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &sine(440.0, 16000, 2.0), 16000, 1);

        let signal = AudioLoader::default().load(&path).unwrap();
        assert_eq!(signal.sample_rate(), 16000);
        assert_eq!(signal.len(), 32000);
    }

    #[test]
    fn test_load_resamples_and_downmixes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let mono = sine(440.0, 48000, 1.5);
        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
        write_wav(&path, &stereo, 48000, 2);

        let signal = AudioLoader::default().load(&path).unwrap();
        assert_eq!(signal.sample_rate(), 16000);
        assert_eq!(signal.len(), 24000);
    }

    #[test]
    fn test_too_short_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, &sine(440.0, 16000, 0.5), 16000, 1);

        let result = AudioLoader::default().load(&path);
        assert!(matches!(result, Err(AudioError::TooShort { .. })));
    }

    #[test]
    fn test_overlong_is_truncated_exactly() {
        let loader = AudioLoader::new(LoaderConfig {
            max_duration_secs: 2.0,
            ..Default::default()
        });
        let signal = AudioSignal::new(vec![0.1; 16000 * 5], 16000);
        let signal = loader.finalize(signal).unwrap();
        assert_eq!(signal.len(), 2 * 16000);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let result = AudioLoader::default().load(&path);
        assert!(matches!(result, Err(AudioError::Decode(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AudioLoader::default().load(Path::new("/nonexistent/clip.wav"));
        assert!(matches!(result, Err(AudioError::Io(_))));
    }
}
