use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{Transcriber, AUTO_LANGUAGE};

/// whisper.cpp transcriber
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    n_threads: i32,
}

impl WhisperTranscriber {
    /// Load a ggml Whisper model from `model_path`
    pub fn new(model_path: &Path, n_threads: i32) -> Result<Self> {
        Self::validate_model(model_path)?;

        info!("Loading Whisper model from {:?}", model_path);
        let ctx = WhisperContext::new_with_params(
            model_path.to_str().context("Invalid model path")?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to load Whisper model: {}", e))?;

        info!("Whisper model loaded successfully");

        Ok(Self {
            ctx,
            n_threads: n_threads.max(1),
        })
    }

    fn validate_model(path: &Path) -> Result<()> {
        if !path.exists() {
            anyhow::bail!("Model file not found: {:?}", path);
        }

        let size_mb = std::fs::metadata(path)?.len() / (1024 * 1024);
        if size_mb < 30 {
            anyhow::bail!(
                "Model file too small ({}MB). Expected at least 30MB for a valid Whisper model.",
                size_mb
            );
        }
        if size_mb > 3000 {
            warn!("Model size {}MB is unusual for a Whisper model", size_mb);
        }

        debug!("Whisper model file validated: {}MB", size_mb);
        Ok(())
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<String> {
        let start_time = Instant::now();

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.n_threads);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let language = language.unwrap_or(AUTO_LANGUAGE);
        if language != AUTO_LANGUAGE {
            params.set_language(Some(language));
        }

        // Fresh state per call
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| anyhow::anyhow!("Failed to create Whisper state: {}", e))?;

        state
            .full(params, samples)
            .map_err(|e| anyhow::anyhow!("Whisper inference failed: {}", e))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| anyhow::anyhow!("Failed to get segment count: {}", e))?;

        let mut text_parts = Vec::new();
        for i in 0..num_segments {
            if let Ok(segment_text) = state.full_get_segment_text(i) {
                let trimmed = segment_text.trim();
                if !trimmed.is_empty() {
                    text_parts.push(trimmed.to_string());
                }
            }
        }

        let text = text_parts.join(" ");
        debug!(
            "Transcribed {} samples in {:?} ({})",
            samples.len(),
            start_time.elapsed(),
            language
        );

        Ok(text)
    }
}
