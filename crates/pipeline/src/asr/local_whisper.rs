use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::Transcriber;
use crate::error::{PipelineError, Result};
use crate::{AudioBuffer, TranscriptSegment};

/// Local Whisper ASR backend using whisper.cpp via whisper-rs.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    language: Option<String>,
}

impl WhisperTranscriber {
    /// Loads a GGML Whisper model from disk (e.g. ggml-base.en.bin).
    pub fn new(model_path: &str, language: Option<String>) -> anyhow::Result<Self> {
        info!(model_path, "Loading Whisper model");
        let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
            .map_err(|e| anyhow::anyhow!("Failed to load Whisper model '{model_path}': {e}"))?;
        info!("Whisper model loaded");
        Ok(Self { ctx, language })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<Vec<TranscriptSegment>> {
        let samples = audio.samples.clone();
        let lang = self.language.clone();

        // whisper-rs is CPU-bound; run on the blocking thread pool
        let ctx_ptr = &self.ctx as *const WhisperContext;
        // SAFETY: WhisperContext is Send+Sync, and we create a new state per call
        let ctx_ref = unsafe { &*ctx_ptr };

        let segments = tokio::task::spawn_blocking(move || -> Result<Vec<TranscriptSegment>> {
            let mut state = ctx_ref.create_state().map_err(|e| {
                PipelineError::TranscriptionFailed(format!("Whisper state: {e}"))
            })?;

            let mut params = FullParams::new(SamplingStrategy::BeamSearch {
                beam_size: 5,
                patience: 1.0,
            });

            if let Some(ref lang) = lang {
                params.set_language(Some(lang));
            } else {
                params.set_detect_language(true);
            }
            params.set_translate(false);
            params.set_print_progress(false);
            params.set_print_special(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            params.set_single_segment(false);
            params.set_no_speech_thold(0.6);
            params.set_suppress_blank(true);

            state.full(params, &samples).map_err(|e| {
                PipelineError::TranscriptionFailed(format!("Whisper inference: {e}"))
            })?;

            let n_segments = state.full_n_segments();
            let mut out = Vec::with_capacity(n_segments as usize);
            for i in 0..n_segments {
                let Some(segment) = state.get_segment(i) else {
                    continue;
                };
                let Ok(text) = segment.to_str() else {
                    continue;
                };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                // Whisper timestamps are in centiseconds
                out.push(TranscriptSegment {
                    text: text.to_string(),
                    start_ms: (segment.start_timestamp().max(0) as u64) * 10,
                    end_ms: (segment.end_timestamp().max(0) as u64) * 10,
                });
            }

            debug!(segments = out.len(), "Whisper transcription complete");
            Ok(out)
        })
        .await
        .map_err(|e| PipelineError::TranscriptionFailed(format!("Whisper task join: {e}")))??;

        Ok(segments)
    }

    fn name(&self) -> &str {
        "local_whisper"
    }
}
