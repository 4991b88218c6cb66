use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use minuted_api::build_router;
use minuted_api::state::AppState;
use minuted_config::Settings;
use minuted_pipeline::actions::{ActionExtractor, HttpActionExtractor};
use minuted_pipeline::asr::HttpTranscriber;
use minuted_pipeline::voiceprints::{HttpVoiceprintStore, VoiceprintStore};
use minuted_pipeline::{Diarizer, Pipeline, PipelineConfig, Transcriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load().context("loading settings")?;

    let config = PipelineConfig {
        similarity_threshold: settings.pipeline.similarity_threshold,
        min_span_ms: settings.pipeline.min_span_ms,
        window_ms: settings.pipeline.window_ms,
        cluster_threshold: settings.pipeline.cluster_threshold,
        snippet_secs: settings.pipeline.snippet_secs,
        timeout_secs: settings.pipeline.timeout_secs,
        ffmpeg_path: settings.pipeline.ffmpeg_path.clone(),
        ..PipelineConfig::default()
    };

    let transcriber = build_transcriber(&settings)?;
    let diarizer = build_diarizer(&settings, &config)?;
    info!(
        transcriber = transcriber.name(),
        diarizer = diarizer.name(),
        "Pipeline backends ready"
    );
    let pipeline = Pipeline::new(transcriber, diarizer, config);

    let store: Option<Arc<dyn VoiceprintStore>> = match &settings.voiceprints.base_url {
        Some(url) => Some(Arc::new(HttpVoiceprintStore::new(
            url.clone(),
            settings.voiceprints.api_key.as_deref(),
        )?)),
        None => None,
    };

    let actions: Option<Arc<dyn ActionExtractor>> = match &settings.actions.base_url {
        Some(url) => Some(Arc::new(HttpActionExtractor::new(
            url.clone(),
            settings.actions.api_token.as_deref(),
        )?)),
        None => None,
    };

    let state = AppState {
        pipeline,
        store,
        actions,
        max_upload_mb: settings.server.max_upload_mb,
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "minuted API listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn build_transcriber(settings: &Settings) -> anyhow::Result<Arc<dyn Transcriber>> {
    match settings.asr.backend.as_str() {
        "remote" => {
            let url = settings
                .asr
                .remote_url
                .as_deref()
                .context("asr.remote_url is required for the remote ASR backend")?;
            Ok(Arc::new(HttpTranscriber::new(
                url,
                settings.asr.remote_api_key.as_deref(),
            )?))
        }
        #[cfg(feature = "local-whisper")]
        "local_whisper" => {
            let model = settings
                .asr
                .whisper_model_path
                .as_deref()
                .context("asr.whisper_model_path is required for the local_whisper backend")?;
            Ok(Arc::new(minuted_pipeline::asr::WhisperTranscriber::new(
                model,
                settings.asr.language.clone(),
            )?))
        }
        other => anyhow::bail!("unknown or unavailable ASR backend '{other}'"),
    }
}

#[cfg(feature = "local-pyannote")]
fn build_diarizer(
    settings: &Settings,
    config: &PipelineConfig,
) -> anyhow::Result<Arc<dyn Diarizer>> {
    use minuted_pipeline::diarize::{ClusteringDiarizer, PyannoteEmbedder};

    let embedder = PyannoteEmbedder::new(&settings.diarizer.embedding_model_path)?;
    Ok(Arc::new(ClusteringDiarizer::new(
        Arc::new(embedder),
        config.clone(),
    )))
}

#[cfg(not(feature = "local-pyannote"))]
fn build_diarizer(
    _settings: &Settings,
    _config: &PipelineConfig,
) -> anyhow::Result<Arc<dyn Diarizer>> {
    anyhow::bail!("this build has no diarization backend; rebuild with --features local-pyannote")
}
