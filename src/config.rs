use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::LoaderConfig;
use crate::emotion::service::ClassifierConfig;
use crate::emotion::{parse_labels, ClassifierError, Emotion, PoolingMode};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

const DEFAULT_MODEL_NAME: &str = "wav2vec2-lg-xlsr-en-speech-emotion-recognition";

/// Startup configuration problems; all of them are fatal
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("Invalid audio duration bounds: min {min}s, max {max}s")]
    InvalidDuration { min: f32, max: f32 },

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("max_upload_bytes must be positive")]
    InvalidUploadLimit,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,

    // Server
    pub host: String,
    pub port: u16,

    // Model
    pub model_dir: PathBuf,
    pub encoder_file: String,
    pub head_file: String,
    pub labels: Vec<String>,
    pub pooling_mode: Option<String>,
    pub n_threads: usize,

    // Audio
    pub sample_rate: u32,
    pub min_audio_secs: f32,
    pub max_audio_secs: f32,

    // Uploads
    pub temp_dir: PathBuf,
    pub max_upload_bytes: usize,

    // Transcription
    pub whisper_model_path: Option<PathBuf>,
    pub default_language: String,

    pub emoji_top_k: usize,

    /// Expose internal error text in 5xx responses
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = Self::default_config_dir().unwrap_or_else(|_| PathBuf::from(".emotion-service"));
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_dir: config_dir.join("models").join(DEFAULT_MODEL_NAME),
            encoder_file: "encoder.onnx".to_string(),
            head_file: "head.json".to_string(),
            labels: Emotion::ALL.iter().map(|e| e.as_str().to_string()).collect(),
            pooling_mode: None,
            n_threads: 1,
            sample_rate: 16000,
            min_audio_secs: 1.0,
            max_audio_secs: 60.0,
            temp_dir: std::env::temp_dir().join("emotion-service"),
            max_upload_bytes: 25 * 1024 * 1024,
            whisper_model_path: None,
            default_language: "en".to_string(),
            emoji_top_k: 3,
            debug: false,
        }
    }
}

impl Config {
    /// Load config from file, or fall back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))
        } else {
            Ok(Self::default())
        }
    }

    /// Load an explicitly requested file (which must exist), else the default location
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {:?}", path);
                }
                Self::load(path)
            }
            None => Self::load(&Self::default_config_path()?),
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".emotion-service"))
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Check everything that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mode) = &self.pooling_mode {
            mode.parse::<PoolingMode>()?;
        }
        parse_labels(&self.labels)?;

        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        let durations_ok = self.min_audio_secs.is_finite()
            && self.max_audio_secs.is_finite()
            && self.min_audio_secs > 0.0
            && self.min_audio_secs <= self.max_audio_secs;
        if !durations_ok {
            return Err(ConfigError::InvalidDuration {
                min: self.min_audio_secs,
                max: self.max_audio_secs,
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }
        Ok(())
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.model_dir.join(&self.encoder_file)
    }

    pub fn head_path(&self) -> PathBuf {
        self.model_dir.join(&self.head_file)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            sample_rate: self.sample_rate,
            min_duration_secs: self.min_audio_secs,
            max_duration_secs: self.max_audio_secs,
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            encoder_path: self.encoder_path(),
            head_path: self.head_path(),
            labels: self.labels.clone(),
            pooling_mode: self.pooling_mode.clone(),
            sample_rate: self.sample_rate,
            n_threads: self.n_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.port, 8000);
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.labels.len(), 8);
        assert_eq!(config.labels[0], "angry");
        assert!(config.model_dir.ends_with(DEFAULT_MODEL_NAME));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "port": 9100, "pooling_mode": "max" }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.pooling_mode.as_deref(), Some("max"));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.emoji_top_k, 3);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.debug = true;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.debug);
        assert_eq!(loaded.head_file, "head.json");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(Config::load_from(Some(Path::new("/nonexistent/config.json"))).is_err());
    }

    #[test]
    fn test_invalid_pooling_mode_fatal() {
        let config = Config {
            pooling_mode: Some("attention".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Classifier(ClassifierError::InvalidPoolingMode(_)))
        ));
    }

    #[test]
    fn test_invalid_labels_fatal() {
        let config = Config {
            labels: vec!["happy".to_string(), "bored".to_string()],
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Classifier(ClassifierError::LabelMismatch(_)))
        ));
    }

    #[test]
    fn test_invalid_durations() {
        let config = Config {
            min_audio_secs: 5.0,
            max_audio_secs: 2.0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDuration { .. })));

        let config = Config {
            min_audio_secs: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_paths() {
        let config = Config {
            model_dir: PathBuf::from("/models/ser"),
            ..Config::default()
        };
        assert_eq!(config.encoder_path(), PathBuf::from("/models/ser/encoder.onnx"));
        assert_eq!(config.head_path(), PathBuf::from("/models/ser/head.json"));
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");

        let loader = config.loader_config();
        assert_eq!(loader.sample_rate, 16000);
        assert_eq!(loader.max_duration_secs, 60.0);
    }
}
