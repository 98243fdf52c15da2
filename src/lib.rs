//! Speech emotion recognition service.
//!
//! Audio is decoded and resampled to 16 kHz mono ([`audio`]), described by a
//! set of classical acoustic measurements ([`features`]), scored over a fixed
//! emotion label set by a wav2vec2 classifier ([`emotion`]) and turned into
//! emoji suggestions ([`emoji`]). [`server`] exposes the pipeline over HTTP.

pub mod audio;
pub mod config;
pub mod emoji;
pub mod emotion;
pub mod features;
pub mod server;
pub mod transcription;

pub use audio::{AudioError, AudioLoader, AudioSignal};
pub use config::Config;
pub use emoji::EmojiMapper;
pub use emotion::{ClassifierError, ClassifierService, Emotion, EmotionClassifier, ScoreList};
pub use features::{extract_audio_features, FeatureError, FeatureVector};
