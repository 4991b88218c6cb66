pub mod actions;
pub mod align;
pub mod asr;
pub mod assemble;
pub mod audio;
pub mod config;
pub mod diarize;
pub mod error;
pub mod matcher;
pub mod runner;
pub mod voiceprints;

pub use asr::Transcriber;
pub use config::PipelineConfig;
pub use diarize::Diarizer;
pub use error::{PipelineError, Result};
pub use runner::Pipeline;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Decoded mono PCM owned by a single pipeline invocation. Never persisted.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Normalized samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Peak absolute amplitude; used to tell genuine silence from ASR failure.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// The sample slice covering `[start_ms, end_ms)`, clamped to the buffer.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> &[f32] {
        let to_idx = |ms: u64| ((ms * self.sample_rate as u64) / 1000) as usize;
        let start = to_idx(start_ms).min(self.samples.len());
        let end = to_idx(end_ms).clamp(start, self.samples.len());
        &self.samples[start..end]
    }
}

/// A speaker-agnostic piece of transcribed speech, ordered by `start_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// A contiguous interval attributed to one anonymous voice cluster, plus the
/// cluster's representative embedding. Cluster ids are meaningless outside
/// the run that produced them.
#[derive(Debug, Clone)]
pub struct DiarizationSpan {
    pub cluster_id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub embedding: Vec<f32>,
}

/// A transcript segment joined with the voice that spoke it. `speaker` holds
/// the synthetic cluster label until resolution substitutes a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// An enrolled team member's voice signature. Immutable input; the embedding
/// is produced by an external enrollment step.
#[derive(Debug, Clone)]
pub struct EnrolledVoiceprint {
    pub user_name: String,
    pub embedding: Vec<f32>,
}

/// Synthetic label -> resolved display name, for clusters matched above
/// threshold. BTreeMap keeps serialization order deterministic.
pub type SpeakerMap = BTreeMap<String, String>;

/// A voice nobody could be matched to, carrying a short excerpt so a human
/// can identify it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedSpeaker {
    pub label: String,
    pub audio_snippet_b64: String,
}

/// Derived metadata for downstream collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingStats {
    pub segment_count: usize,
    /// Distinct identities: resolved names plus unresolved labels.
    pub speaker_count: usize,
    pub duration_ms: u64,
}

/// The pipeline's output contract.
///
/// Invariant: the distinct `speaker` values in `transcript` are exactly the
/// resolved names in `speaker_map` plus the labels in `unresolved_speakers`,
/// and no label appears on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingResult {
    pub transcript: Vec<Utterance>,
    pub speaker_map: SpeakerMap,
    pub unresolved_speakers: Vec<UnresolvedSpeaker>,
    pub stats: MeetingStats,
}
