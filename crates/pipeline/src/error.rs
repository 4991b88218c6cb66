use thiserror::Error;

/// Failure taxonomy for one pipeline invocation.
///
/// Ingestion, transcription and diarization failures are fatal to the whole
/// run (alignment needs both outputs). Voiceprint-store trouble is NOT
/// surfaced through this type — the runner degrades to an empty enrolled set
/// instead. Action extraction fails independently of the transcript and is
/// always retryable.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The uploaded bytes could not be decoded into PCM audio.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decoding succeeded but produced zero samples.
    #[error("audio has zero duration")]
    EmptyAudio,

    /// The ASR engine errored, or returned nothing for clearly non-silent audio.
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// The diarization engine errored.
    #[error("diarization failed: {0}")]
    DiarizationFailed(String),

    /// A transcript label is in neither the speaker map nor the unresolved
    /// list. Programmer error — never coerced.
    #[error("inconsistent speaker mapping: {0}")]
    InconsistentSpeakerMapping(String),

    /// An upstream dependency (or the whole invocation) hit its deadline.
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// An upstream dependency was unreachable.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An upstream dependency answered with a payload we refuse to coerce.
    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
}

impl PipelineError {
    /// Whether the caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::UpstreamTimeout(_) | PipelineError::UpstreamUnavailable(_)
        )
    }

    /// Whether the failure is fixable by the caller changing their input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedFormat(_) | PipelineError::EmptyAudio
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
