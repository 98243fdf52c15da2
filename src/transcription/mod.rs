//! Speech-to-text for `/analyze`.
//!
//! Transcription is an optional collaborator. The server holds an
//! `Option<Arc<dyn Transcriber>>` and reports an empty transcript when none
//! is configured or when the backend fails.

use anyhow::Result;

#[cfg(feature = "transcription")]
mod whisper;

#[cfg(feature = "transcription")]
pub use whisper::WhisperTranscriber;

/// Language value that asks the backend to detect the language itself
pub const AUTO_LANGUAGE: &str = "auto";

/// Turns 16 kHz mono samples into text
pub trait Transcriber: Send + Sync {
    /// Transcribe `samples`; `language` of `None` or `"auto"` means detect
    fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<String>;
}

/// Normalise a request's language hint: trimmed, lowercased, empty -> `None`
pub fn normalize_language(language: Option<&str>) -> Option<String> {
    language
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Transcriber for Echo {
        fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<String> {
            Ok(format!("{} samples ({})", samples.len(), language.unwrap_or(AUTO_LANGUAGE)))
        }
    }

    #[test]
    fn test_trait_object_usable() {
        let transcriber: std::sync::Arc<dyn Transcriber> = std::sync::Arc::new(Echo);
        let text = transcriber.transcribe(&[0.0; 160], Some("en")).unwrap();
        assert_eq!(text, "160 samples (en)");
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(Some(" EN ")), Some("en".to_string()));
        assert_eq!(normalize_language(Some("  ")), None);
        assert_eq!(normalize_language(None), None);
    }
}
