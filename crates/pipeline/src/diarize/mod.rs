pub mod clustering;

#[cfg(feature = "local-pyannote")]
pub mod pyannote;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::{AudioBuffer, DiarizationSpan};

use clustering::{apply_min_span_policy, assign_clusters, build_spans, centroids, Window};

#[cfg(feature = "local-pyannote")]
pub use pyannote::PyannoteEmbedder;

/// Trait for pluggable diarization backends.
///
/// Output is time-ordered; spans sharing a `cluster_id` are assumed to be
/// the same physical speaker, and each span carries its cluster's
/// representative embedding. Diarization is purely acoustic — it never sees
/// transcript text.
#[async_trait]
pub trait Diarizer: Send + Sync + 'static {
    async fn diarize(&self, audio: &AudioBuffer) -> Result<Vec<DiarizationSpan>>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Computes a fixed-dimension voice embedding for one audio window.
///
/// Implementations are CPU-bound model calls; the diarizer drives them from
/// the blocking thread pool.
pub trait SpeakerEmbedder: Send + Sync + 'static {
    fn embed(&self, samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<f32>>;
}

/// Default diarizer: slices the audio into fixed windows, embeds each
/// non-silent window, clusters windows by embedding similarity against
/// running centroids, then merges contiguous windows into spans and applies
/// the minimum-span policy. Cluster labels are "Speaker 1", "Speaker 2", ...
/// in order of first appearance; they carry no meaning outside one run.
pub struct ClusteringDiarizer {
    embedder: Arc<dyn SpeakerEmbedder>,
    config: PipelineConfig,
}

impl ClusteringDiarizer {
    pub fn new(embedder: Arc<dyn SpeakerEmbedder>, config: PipelineConfig) -> Self {
        Self { embedder, config }
    }

    fn run(&self, audio: &AudioBuffer) -> Result<Vec<DiarizationSpan>> {
        let window_ms = self.config.window_ms.max(1);
        let duration_ms = audio.duration_ms();

        let mut windows = Vec::new();
        let mut start = 0u64;
        while start < duration_ms {
            let end = (start + window_ms).min(duration_ms);
            let samples = audio.slice_ms(start, end);

            // Near-silent windows carry no usable voice signal; leaving them
            // out produces the diarization gaps the aligner labels later.
            let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            if peak > self.config.silence_peak_floor && !samples.is_empty() {
                let embedding = self
                    .embedder
                    .embed(samples, audio.sample_rate)
                    .map_err(|e| PipelineError::DiarizationFailed(format!("embedding: {e}")))?;
                windows.push(Window {
                    start_ms: start,
                    end_ms: end,
                    embedding,
                });
            }
            start = end;
        }

        if windows.is_empty() {
            debug!("No voiced windows found, diarization is empty");
            return Ok(Vec::new());
        }

        let assignments = assign_clusters(&windows, self.config.cluster_threshold);
        let n_clusters = assignments.iter().copied().max().map_or(0, |m| m + 1);
        let representatives = centroids(&windows, &assignments, n_clusters);

        let spans = build_spans(&windows, &assignments);
        let spans = apply_min_span_policy(spans, self.config.min_span_ms);

        // Label clusters by first appearance among surviving spans
        let mut label_of = vec![None::<String>; n_clusters];
        let mut next = 1usize;
        let mut out = Vec::with_capacity(spans.len());
        for span in &spans {
            let label = label_of[span.cluster].get_or_insert_with(|| {
                let label = format!("Speaker {next}");
                next += 1;
                label
            });
            out.push(DiarizationSpan {
                cluster_id: label.clone(),
                start_ms: span.start_ms,
                end_ms: span.end_ms,
                embedding: representatives[span.cluster].clone(),
            });
        }

        info!(
            spans = out.len(),
            clusters = next - 1,
            "Diarization complete"
        );
        Ok(out)
    }
}

#[async_trait]
impl Diarizer for ClusteringDiarizer {
    async fn diarize(&self, audio: &AudioBuffer) -> Result<Vec<DiarizationSpan>> {
        let audio = audio.clone();
        let embedder = Arc::clone(&self.embedder);
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            ClusteringDiarizer { embedder, config }.run(&audio)
        })
        .await
        .map_err(|e| PipelineError::DiarizationFailed(format!("task join: {e}")))?
    }

    fn name(&self) -> &str {
        "clustering"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps window amplitude to one of two orthogonal voices, so tests can
    /// script speaker changes through the synthesized waveform alone.
    struct AmplitudeEmbedder;

    impl SpeakerEmbedder for AmplitudeEmbedder {
        fn embed(&self, samples: &[f32], _sample_rate: u32) -> anyhow::Result<Vec<f32>> {
            let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            if peak < 0.5 {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    fn tone(duration_ms: u64, amplitude: f32) -> Vec<f32> {
        let n = (duration_ms * 16) as usize;
        (0..n).map(|i| (i as f32 * 0.3).sin() * amplitude).collect()
    }

    fn diarizer() -> ClusteringDiarizer {
        ClusteringDiarizer::new(Arc::new(AmplitudeEmbedder), PipelineConfig::default())
    }

    #[tokio::test]
    async fn single_voice_yields_one_cluster_covering_everything() {
        let audio = AudioBuffer {
            samples: tone(4000, 0.3),
            sample_rate: 16_000,
        };
        let spans = diarizer().diarize(&audio).await.unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].cluster_id, "Speaker 1");
        assert_eq!(spans[0].start_ms, 0);
        assert_eq!(spans[0].end_ms, audio.duration_ms());
    }

    #[tokio::test]
    async fn two_voices_yield_two_clusters() {
        let mut samples = tone(3000, 0.3);
        samples.extend(tone(3000, 0.9));
        let audio = AudioBuffer {
            samples,
            sample_rate: 16_000,
        };
        let spans = diarizer().diarize(&audio).await.unwrap();
        let mut clusters: Vec<&str> = spans.iter().map(|s| s.cluster_id.as_str()).collect();
        clusters.dedup();
        assert_eq!(clusters, vec!["Speaker 1", "Speaker 2"]);
    }

    #[tokio::test]
    async fn silence_produces_no_spans() {
        let audio = AudioBuffer {
            samples: vec![0.0; 32_000],
            sample_rate: 16_000,
        };
        let spans = diarizer().diarize(&audio).await.unwrap();
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn silent_middle_leaves_a_gap() {
        let mut samples = tone(2000, 0.3);
        samples.extend(vec![0.0; 32_000]); // 2s silence
        samples.extend(tone(2000, 0.3));
        let audio = AudioBuffer {
            samples,
            sample_rate: 16_000,
        };
        let spans = diarizer().diarize(&audio).await.unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].cluster_id, spans[1].cluster_id);
        assert!(spans[0].end_ms <= 2000);
        assert!(spans[1].start_ms >= 4000);
    }
}
