//! Orchestrates one meeting through decode, transcription + diarization,
//! alignment, voiceprint resolution and assembly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::align::align;
use crate::asr::{Transcriber, validate_segments};
use crate::assemble::assemble;
use crate::audio::decode_audio;
use crate::config::PipelineConfig;
use crate::diarize::Diarizer;
use crate::error::{PipelineError, Result};
use crate::matcher::{resolve_speakers, snippet_b64};
use crate::voiceprints::VoiceprintStore;
use crate::{AudioBuffer, DiarizationSpan, EnrolledVoiceprint, MeetingResult, UnresolvedSpeaker, Utterance};

/// One configured processing pipeline. Cheap to clone and share across
/// requests; backends are stateless between calls.
#[derive(Clone)]
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    diarizer: Arc<dyn Diarizer>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        diarizer: Arc<dyn Diarizer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            transcriber,
            diarizer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes one uploaded meeting recording end to end.
    ///
    /// The whole invocation runs under the configured wall-clock ceiling;
    /// blowing the deadline surfaces as `UpstreamTimeout` and any in-flight
    /// backend work is dropped with it.
    pub async fn process(
        &self,
        audio_bytes: Vec<u8>,
        enrolled: &[EnrolledVoiceprint],
    ) -> Result<MeetingResult> {
        let deadline = Duration::from_secs(self.config.timeout_secs);
        tokio::time::timeout(deadline, self.run(audio_bytes, enrolled))
            .await
            .map_err(|_| {
                PipelineError::UpstreamTimeout(format!(
                    "pipeline exceeded {}s deadline",
                    self.config.timeout_secs
                ))
            })?
    }

    /// Fetches the team's voiceprints and processes the recording.
    ///
    /// A store failure degrades to an empty enrolled set rather than failing
    /// the run: the meeting still gets transcribed and diarized, with every
    /// voice left unresolved for post-hoc resolution.
    pub async fn process_for_team(
        &self,
        audio_bytes: Vec<u8>,
        store: &dyn VoiceprintStore,
        team_id: &str,
    ) -> Result<MeetingResult> {
        let enrolled = match store.fetch(team_id).await {
            Ok(enrolled) => enrolled,
            Err(e) => {
                warn!(team_id, error = %e, "Voiceprint store unavailable, resolving nobody");
                Vec::new()
            }
        };
        self.process(audio_bytes, &enrolled).await
    }

    async fn run(
        &self,
        audio_bytes: Vec<u8>,
        enrolled: &[EnrolledVoiceprint],
    ) -> Result<MeetingResult> {
        // Decoding may shell out to ffmpeg and resample; keep it off the
        // async workers.
        let config = self.config.clone();
        let audio = tokio::task::spawn_blocking(move || decode_audio(&audio_bytes, &config))
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(format!("decode task: {e}")))??;

        info!(
            duration_ms = audio.duration_ms(),
            transcriber = self.transcriber.name(),
            diarizer = self.diarizer.name(),
            "Processing meeting audio"
        );

        // Transcription and diarization are independent; run them
        // concurrently and fail the run on whichever errors first.
        let (segments, spans) = tokio::try_join!(
            self.transcriber.transcribe(&audio),
            self.diarizer.diarize(&audio),
        )?;

        let segments = validate_segments(segments, &audio, self.config.silence_peak_floor)?;
        let aligned = align(&segments, &spans);

        // One representative embedding per cluster, in first-appearance order.
        let mut clusters: Vec<(String, Vec<f32>)> = Vec::new();
        for span in &spans {
            if !clusters.iter().any(|(label, _)| label == &span.cluster_id) {
                clusters.push((span.cluster_id.clone(), span.embedding.clone()));
            }
        }

        let outcome = resolve_speakers(&clusters, enrolled, self.config.similarity_threshold);

        let mut unresolved = Vec::with_capacity(outcome.unresolved.len());
        for label in &outcome.unresolved {
            unresolved.push(UnresolvedSpeaker {
                audio_snippet_b64: self.cluster_snippet(&audio, label, &spans),
                label: label.clone(),
            });
        }
        // Gap labels exist only in the aligned transcript, never in the
        // diarization spans; they are unresolved by construction.
        for label in gap_labels(&aligned, &clusters) {
            let snippet = self.gap_snippet(&audio, &label, &aligned);
            unresolved.push(UnresolvedSpeaker {
                label,
                audio_snippet_b64: snippet,
            });
        }

        assemble(aligned, outcome.speaker_map, unresolved)
    }

    /// Excerpt from the cluster's earliest span.
    fn cluster_snippet(&self, audio: &AudioBuffer, label: &str, spans: &[DiarizationSpan]) -> String {
        let Some(span) = spans.iter().find(|s| s.cluster_id == label) else {
            return String::new();
        };
        match snippet_b64(audio, span.start_ms, span.end_ms, self.config.snippet_secs) {
            Ok(snippet) => snippet,
            Err(e) => {
                warn!(label, error = %e, "Failed to encode speaker snippet");
                String::new()
            }
        }
    }

    /// Excerpt from the gap label's earliest utterance.
    fn gap_snippet(&self, audio: &AudioBuffer, label: &str, aligned: &[Utterance]) -> String {
        let Some(utterance) = aligned.iter().find(|u| u.speaker == label) else {
            return String::new();
        };
        match snippet_b64(audio, utterance.start_ms, utterance.end_ms, self.config.snippet_secs) {
            Ok(snippet) => snippet,
            Err(e) => {
                warn!(label, error = %e, "Failed to encode speaker snippet");
                String::new()
            }
        }
    }
}

/// Transcript labels that correspond to no diarization cluster, deduplicated
/// in order of first appearance.
fn gap_labels(aligned: &[Utterance], clusters: &[(String, Vec<f32>)]) -> Vec<String> {
    let mut labels = Vec::new();
    for utterance in aligned {
        let is_cluster = clusters.iter().any(|(label, _)| label == &utterance.speaker);
        if !is_cluster && !labels.contains(&utterance.speaker) {
            labels.push(utterance.speaker.clone());
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TranscriptSegment;
    use async_trait::async_trait;

    struct SlowTranscriber;

    #[async_trait]
    impl Transcriber for SlowTranscriber {
        async fn transcribe(&self, _audio: &AudioBuffer) -> Result<Vec<TranscriptSegment>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct EmptyDiarizer;

    #[async_trait]
    impl Diarizer for EmptyDiarizer {
        async fn diarize(&self, _audio: &AudioBuffer) -> Result<Vec<DiarizationSpan>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "empty"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_surfaces_as_timeout() {
        let config = PipelineConfig {
            timeout_secs: 5,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(Arc::new(SlowTranscriber), Arc::new(EmptyDiarizer), config);

        let wav = crate::audio::encode_wav(&vec![0.3f32; 16_000], 16_000).unwrap();
        let err = pipeline.process(wav, &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamTimeout(_)));
    }
}
