//! Matches diarization clusters against enrolled voiceprints.

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use crate::audio::encode_wav;
use crate::{AudioBuffer, EnrolledVoiceprint, SpeakerMap};

/// Cosine similarity between two embeddings. Returns 0.0 when either vector
/// is zero-length, zero-norm, or the dimensions disagree, so a degenerate
/// embedding can never clear a positive threshold.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Result of voiceprint resolution: resolved labels and the leftover ones.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// cluster label -> enrolled user name
    pub speaker_map: SpeakerMap,
    /// cluster labels no voiceprint claimed
    pub unresolved: Vec<String>,
}

/// Resolves cluster labels to enrolled user names.
///
/// Greedy one-to-one assignment over all (cluster, voiceprint) pairs in
/// descending similarity order: the globally best pair wins first, then the
/// best among what remains, and so on. Only pairs strictly above `threshold`
/// may match.
/// Each cluster resolves to at most one name and each name claims at most
/// one cluster, so two clusters can never map to the same person. Ties are
/// broken by cluster label then user name for determinism.
pub fn resolve_speakers(
    clusters: &[(String, Vec<f32>)],
    enrolled: &[EnrolledVoiceprint],
    threshold: f32,
) -> MatchOutcome {
    let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
    for (ci, (label, embedding)) in clusters.iter().enumerate() {
        for (vi, vp) in enrolled.iter().enumerate() {
            if vp.embedding.len() != embedding.len() {
                debug!(
                    cluster = %label,
                    user = %vp.user_name,
                    "Skipping voiceprint with mismatched embedding dimension"
                );
                continue;
            }
            pairs.push((cosine_similarity(embedding, &vp.embedding), ci, vi));
        }
    }

    pairs.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| clusters[a.1].0.cmp(&clusters[b.1].0))
            .then_with(|| enrolled[a.2].user_name.cmp(&enrolled[b.2].user_name))
    });

    let mut used_clusters = BTreeSet::new();
    let mut used_voiceprints = BTreeSet::new();
    let mut speaker_map = SpeakerMap::new();

    for (similarity, ci, vi) in pairs {
        if similarity <= threshold {
            break;
        }
        if used_clusters.contains(&ci) || used_voiceprints.contains(&vi) {
            continue;
        }
        debug!(
            cluster = %clusters[ci].0,
            user = %enrolled[vi].user_name,
            similarity,
            "Voiceprint match"
        );
        speaker_map.insert(clusters[ci].0.clone(), enrolled[vi].user_name.clone());
        used_clusters.insert(ci);
        used_voiceprints.insert(vi);
    }

    let unresolved = clusters
        .iter()
        .enumerate()
        .filter(|(ci, _)| !used_clusters.contains(ci))
        .map(|(_, (label, _))| label.clone())
        .collect();

    MatchOutcome {
        speaker_map,
        unresolved,
    }
}

/// Encodes up to `max_secs` of audio starting at `start_ms` as a WAV data
/// URL, for review UIs to play back an unresolved voice.
pub fn snippet_b64(
    audio: &AudioBuffer,
    start_ms: u64,
    end_ms: u64,
    max_secs: u64,
) -> anyhow::Result<String> {
    let capped_end = end_ms.min(start_ms + max_secs * 1000);
    let samples = audio.slice_ms(start_ms, capped_end);
    let wav = encode_wav(samples, audio.sample_rate)?;
    Ok(format!("data:audio/wav;base64,{}", BASE64.encode(wav)))
}
