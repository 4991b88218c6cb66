use serde::{Deserialize, Serialize};

/// Configuration for one pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sample rate both the transcriber and diarizer consume.
    pub target_sample_rate: u32,
    /// Cosine-similarity floor for resolving a cluster to an enrolled voice.
    pub similarity_threshold: f32,
    /// Diarization spans shorter than this are merged into a contiguous
    /// neighbour of the same cluster, else dropped as noise.
    pub min_span_ms: u64,
    /// Diarization analysis window length.
    pub window_ms: u64,
    /// Cosine-similarity floor for joining a window to an existing cluster.
    pub cluster_threshold: f32,
    /// Length of the excerpt attached to each unresolved speaker.
    pub snippet_secs: u64,
    /// Peak amplitude below which audio counts as silent (so an empty
    /// transcript is accepted rather than treated as engine failure).
    pub silence_peak_floor: f32,
    /// Wall-clock ceiling for one invocation.
    pub timeout_secs: u64,
    /// Explicit ffmpeg binary for the non-WAV decode fallback; `None`
    /// resolves from PATH.
    pub ffmpeg_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            similarity_threshold: 0.50,
            min_span_ms: 500,
            window_ms: 1000,
            cluster_threshold: 0.70,
            snippet_secs: 5,
            silence_peak_floor: 0.01,
            timeout_secs: 600,
            ffmpeg_path: None,
        }
    }
}
