pub mod remote;

#[cfg(feature = "local-whisper")]
pub mod local_whisper;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};
use crate::{AudioBuffer, TranscriptSegment};

pub use remote::HttpTranscriber;

#[cfg(feature = "local-whisper")]
pub use local_whisper::WhisperTranscriber;

/// Trait for pluggable speech-to-text backends.
///
/// Backends take the normalized buffer and return time-ordered,
/// speaker-agnostic segments. They hold no state between calls; every call
/// is restartable.
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<Vec<TranscriptSegment>>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Validates raw backend output before alignment.
///
/// Zero segments for audio whose peak clears `silence_floor` is treated as
/// engine failure rather than silence — we refuse to fabricate an empty
/// transcript. Segments are also re-sorted by start time so alignment can
/// rely on ordering regardless of backend quirks.
pub fn validate_segments(
    mut segments: Vec<TranscriptSegment>,
    audio: &AudioBuffer,
    silence_floor: f32,
) -> Result<Vec<TranscriptSegment>> {
    if segments.is_empty() && audio.peak() > silence_floor {
        return Err(PipelineError::TranscriptionFailed(
            "engine returned zero segments for non-silent audio".to_string(),
        ));
    }

    for seg in &segments {
        if seg.end_ms < seg.start_ms {
            return Err(PipelineError::TranscriptionFailed(format!(
                "segment ends before it starts ({} < {})",
                seg.end_ms, seg.start_ms
            )));
        }
    }

    segments.sort_by_key(|s| s.start_ms);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start_ms: u64, end_ms: u64) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            start_ms,
            end_ms,
        }
    }

    fn loud_audio() -> AudioBuffer {
        AudioBuffer {
            samples: vec![0.5; 16_000],
            sample_rate: 16_000,
        }
    }

    #[test]
    fn zero_segments_on_loud_audio_is_failure() {
        let res = validate_segments(vec![], &loud_audio(), 0.01);
        assert!(matches!(res, Err(PipelineError::TranscriptionFailed(_))));
    }

    #[test]
    fn zero_segments_on_silent_audio_is_accepted() {
        let silent = AudioBuffer {
            samples: vec![0.0; 16_000],
            sample_rate: 16_000,
        };
        let res = validate_segments(vec![], &silent, 0.01).unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn segments_are_reordered_by_start() {
        let out = validate_segments(
            vec![seg("b", 2000, 3000), seg("a", 0, 1000)],
            &loud_audio(),
            0.01,
        )
        .unwrap();
        assert_eq!(out[0].text, "a");
        assert_eq!(out[1].text, "b");
    }

    #[test]
    fn inverted_segment_is_rejected() {
        let res = validate_segments(vec![seg("x", 500, 100)], &loud_audio(), 0.01);
        assert!(matches!(res, Err(PipelineError::TranscriptionFailed(_))));
    }
}
