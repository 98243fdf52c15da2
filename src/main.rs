use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use emotion_service::config::Config;
use emotion_service::emotion::service::load_classifier;
use emotion_service::emotion::ClassifierService;
use emotion_service::server::{self, AppState};
use emotion_service::transcription::Transcriber;

/// HTTP service for speech emotion recognition and emoji suggestions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON config file (default: ~/.emotion-service/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding encoder.onnx and head.json
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Pooling mode: "mean", "sum" or "max"
    #[arg(long)]
    pooling_mode: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(mode) = &self.pooling_mode {
            config.pooling_mode = Some(mode.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = Config::load_from(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!("Emotion service starting...");
    info!("Model directory: {:?}", config.model_dir);
    info!(
        "Audio: {} Hz, {}s - {}s",
        config.sample_rate, config.min_audio_secs, config.max_audio_secs
    );

    std::fs::create_dir_all(&config.temp_dir)
        .with_context(|| format!("Failed to create temp dir {:?}", config.temp_dir))?;

    let transcriber = load_transcriber(&config);
    let classifier = Arc::new(ClassifierService::new());
    let classifier_config = config.classifier_config();

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    let state = AppState::new(config, Arc::clone(&classifier), transcriber);
    let server = tokio::spawn(server::serve(listener, state, shutdown_signal()));

    // Serve /health while the model loads; a load failure ends the process
    let loader = Arc::clone(&classifier);
    let loaded = tokio::task::spawn_blocking(move || {
        loader.load_with(|| load_classifier(&classifier_config))
    })
    .await
    .context("Model loading task panicked")?;

    if let Err(e) = loaded {
        error!("Failed to initialize emotion model: {}", e);
        server.abort();
        return Err(e).context("Emotion model initialization failed");
    }

    server
        .await
        .context("Server task failed")?
        .context("Server error")?;

    info!("Emotion service stopped");
    Ok(())
}

#[cfg(feature = "transcription")]
fn load_transcriber(config: &Config) -> Option<Arc<dyn Transcriber>> {
    use emotion_service::transcription::WhisperTranscriber;

    let path = config.whisper_model_path.as_ref()?;
    match WhisperTranscriber::new(path, config.n_threads as i32) {
        Ok(transcriber) => Some(Arc::new(transcriber)),
        Err(e) => {
            warn!("Transcription disabled: {:#}", e);
            None
        }
    }
}

#[cfg(not(feature = "transcription"))]
fn load_transcriber(config: &Config) -> Option<Arc<dyn Transcriber>> {
    if config.whisper_model_path.is_some() {
        warn!("whisper_model_path is set but the 'transcription' feature is not enabled");
    }
    None
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
