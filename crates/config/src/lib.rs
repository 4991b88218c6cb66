use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Top-level application settings.
///
/// Loaded from `config/default.toml`, then `config/{RUN_ENV}.toml`, then
/// environment variables with a `MINUTED__` prefix (double underscore as
/// section separator, e.g. `MINUTED__SERVER__PORT=8080`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub asr: AsrSettings,
    #[serde(default)]
    pub diarizer: DiarizerSettings,
    #[serde(default)]
    pub voiceprints: VoiceprintStoreSettings,
    #[serde(default)]
    pub actions: ActionServiceSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Maximum accepted upload size in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5002,
            max_upload_mb: 500,
        }
    }
}

/// Tunables for the transcription/diarization pipeline itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Cosine-similarity floor for resolving a cluster to an enrolled voice.
    pub similarity_threshold: f32,
    /// Diarization spans shorter than this are merged or dropped as noise.
    pub min_span_ms: u64,
    /// Diarization analysis window length.
    pub window_ms: u64,
    /// Cosine-similarity floor for joining a window to an existing cluster.
    pub cluster_threshold: f32,
    /// Length of the audio excerpt attached to unresolved speakers.
    pub snippet_secs: u64,
    /// Wall-clock ceiling for one pipeline invocation.
    pub timeout_secs: u64,
    /// Explicit ffmpeg binary path; `None` resolves from PATH.
    pub ffmpeg_path: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.50,
            min_span_ms: 500,
            window_ms: 1000,
            cluster_threshold: 0.70,
            snippet_secs: 5,
            timeout_secs: 600,
            ffmpeg_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AsrSettings {
    /// "remote" (HTTP ASR service) or "local_whisper" (requires the
    /// `local-whisper` build feature).
    pub backend: String,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
    pub whisper_model_path: Option<String>,
    /// Language hint for ASR (e.g. "en"). None = auto-detect.
    pub language: Option<String>,
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            backend: "remote".to_string(),
            remote_url: None,
            remote_api_key: None,
            whisper_model_path: None,
            language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiarizerSettings {
    /// Path to the speaker embedding ONNX model (requires the
    /// `local-pyannote` build feature).
    pub embedding_model_path: String,
}

impl Default for DiarizerSettings {
    fn default() -> Self {
        Self {
            embedding_model_path: "models/wespeaker_en_voxceleb_CAM++.onnx".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceprintStoreSettings {
    /// Base URL of the enrolled-voiceprint store. None disables the store;
    /// callers must then supply voiceprints inline with each request.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionServiceSettings {
    /// Base URL of the action-extraction service.
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            pipeline: PipelineSettings::default(),
            asr: AsrSettings::default(),
            diarizer: DiarizerSettings::default(),
            voiceprints: VoiceprintStoreSettings::default(),
            actions: ActionServiceSettings::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_env}")).required(false))
            .add_source(
                Environment::with_prefix("MINUTED")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 5002);
        assert!(settings.pipeline.similarity_threshold > 0.0);
        assert!(settings.pipeline.similarity_threshold <= 1.0);
        assert_eq!(settings.asr.backend, "remote");
    }

    #[test]
    fn env_overrides_apply() {
        // SAFETY: tests in this module run single-threaded over this var.
        unsafe { std::env::set_var("MINUTED__SERVER__PORT", "9999") };
        let settings = Settings::load().expect("settings should load");
        assert_eq!(settings.server.port, 9999);
        unsafe { std::env::remove_var("MINUTED__SERVER__PORT") };
    }
}
