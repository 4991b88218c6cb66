//! Builds the final `MeetingResult` from aligned utterances and the matcher
//! outcome, and applies post-hoc resolutions to an existing result.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::{MeetingResult, MeetingStats, SpeakerMap, UnresolvedSpeaker, Utterance};

/// Substitutes resolved names into the transcript and assembles the result.
///
/// Every synthetic label appearing in `aligned` must be claimed by exactly
/// one side: a resolved entry in `speaker_map` or an `unresolved` entry. A
/// label on both sides, or on neither, means the earlier stages disagree
/// about who spoke and the whole run is rejected rather than shipping a
/// transcript with dangling identities. Map entries and unresolved entries
/// for labels that never made it into the transcript are dropped silently
/// (the min-span policy can erase a cluster after matching saw it).
pub fn assemble(
    aligned: Vec<Utterance>,
    speaker_map: SpeakerMap,
    unresolved: Vec<UnresolvedSpeaker>,
) -> Result<MeetingResult> {
    let present: BTreeSet<&str> = aligned.iter().map(|u| u.speaker.as_str()).collect();

    let speaker_map: SpeakerMap = speaker_map
        .into_iter()
        .filter(|(label, _)| present.contains(label.as_str()))
        .collect();
    let unresolved: Vec<UnresolvedSpeaker> = unresolved
        .into_iter()
        .filter(|u| present.contains(u.label.as_str()))
        .collect();

    let unresolved_labels: BTreeSet<&str> = unresolved.iter().map(|u| u.label.as_str()).collect();

    for label in &present {
        let resolved = speaker_map.contains_key(*label);
        let pending = unresolved_labels.contains(label);
        if resolved && pending {
            return Err(PipelineError::InconsistentSpeakerMapping(format!(
                "label '{label}' is both resolved and unresolved"
            )));
        }
        if !resolved && !pending {
            return Err(PipelineError::InconsistentSpeakerMapping(format!(
                "label '{label}' appears in the transcript but was never accounted for"
            )));
        }
    }

    let transcript: Vec<Utterance> = aligned
        .into_iter()
        .map(|mut u| {
            if let Some(name) = speaker_map.get(&u.speaker) {
                u.speaker = name.clone();
            }
            u
        })
        .collect();

    let stats = compute_stats(&transcript, &speaker_map, &unresolved);
    debug!(
        segments = stats.segment_count,
        speakers = stats.speaker_count,
        "Meeting result assembled"
    );

    Ok(MeetingResult {
        transcript,
        speaker_map,
        unresolved_speakers: unresolved,
        stats,
    })
}

/// Applies human-supplied label -> name resolutions to a finished result.
///
/// Idempotent: a resolution for a label that is no longer unresolved is a
/// no-op, so replaying the same request cannot corrupt the result. Labels
/// the result never contained are ignored the same way.
pub fn apply_resolutions(
    result: &MeetingResult,
    resolutions: &SpeakerMap,
) -> Result<MeetingResult> {
    let mut transcript = result.transcript.clone();
    let mut speaker_map = result.speaker_map.clone();
    let mut unresolved = result.unresolved_speakers.clone();

    for (label, name) in resolutions {
        let Some(pos) = unresolved.iter().position(|u| &u.label == label) else {
            debug!(label = %label, "Resolution for a label not pending, skipping");
            continue;
        };
        unresolved.remove(pos);
        speaker_map.insert(label.clone(), name.clone());
        for utterance in &mut transcript {
            if &utterance.speaker == label {
                utterance.speaker = name.clone();
            }
        }
    }

    let stats = compute_stats(&transcript, &speaker_map, &unresolved);
    Ok(MeetingResult {
        transcript,
        speaker_map,
        unresolved_speakers: unresolved,
        stats,
    })
}

fn compute_stats(
    transcript: &[Utterance],
    speaker_map: &SpeakerMap,
    unresolved: &[UnresolvedSpeaker],
) -> MeetingStats {
    MeetingStats {
        segment_count: transcript.len(),
        speaker_count: speaker_map.len() + unresolved.len(),
        duration_ms: transcript.iter().map(|u| u.end_ms).max().unwrap_or(0),
    }
}
