//! Joins transcript segments with diarization spans by temporal overlap.
//!
//! This is a deterministic pure function: identical inputs always produce
//! identical alignment, and every transcript segment appears in exactly one
//! utterance.

use crate::{DiarizationSpan, TranscriptSegment, Utterance};

/// Assigns each transcript segment the cluster of the span it overlaps most
/// (ties broken by earliest span start). Segments covered by no span get a
/// reserved "Unknown Speaker N" label, where N increments per contiguous gap
/// region — consecutive uncovered segments share one synthetic identity,
/// modelling one unidentifiable voice rather than noise per word.
pub fn align(segments: &[TranscriptSegment], spans: &[DiarizationSpan]) -> Vec<Utterance> {
    let mut utterances = Vec::with_capacity(segments.len());
    let mut gap_counter = 0usize;
    let mut open_gap_label: Option<String> = None;

    for segment in segments {
        let label = match best_span(segment, spans) {
            Some(span) => {
                open_gap_label = None;
                span.cluster_id.clone()
            }
            None => open_gap_label
                .get_or_insert_with(|| {
                    gap_counter += 1;
                    format!("Unknown Speaker {gap_counter}")
                })
                .clone(),
        };

        utterances.push(Utterance {
            speaker: label,
            text: segment.text.clone(),
            start_ms: segment.start_ms,
            end_ms: segment.end_ms,
        });
    }

    utterances
}

/// The span with maximal overlap against `segment`, or None if nothing
/// overlaps. Ties go to the span that starts earliest.
fn best_span<'a>(
    segment: &TranscriptSegment,
    spans: &'a [DiarizationSpan],
) -> Option<&'a DiarizationSpan> {
    let mut best: Option<(&DiarizationSpan, u64)> = None;

    for span in spans {
        let overlap = overlap_ms(segment.start_ms, segment.end_ms, span.start_ms, span.end_ms);
        if overlap == 0 {
            continue;
        }
        best = match best {
            None => Some((span, overlap)),
            Some((b, best_overlap)) => {
                if overlap > best_overlap
                    || (overlap == best_overlap && span.start_ms < b.start_ms)
                {
                    Some((span, overlap))
                } else {
                    Some((b, best_overlap))
                }
            }
        };
    }

    best.map(|(span, _)| span)
}

fn overlap_ms(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> u64 {
    a_end.min(b_end).saturating_sub(a_start.max(b_start))
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

    fn span(cluster: &str, start_ms: u64, end_ms: u64) -> DiarizationSpan {
        DiarizationSpan {
            cluster_id: cluster.to_string(),
            start_ms,
            end_ms,
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn no_segment_is_dropped() {
        let segments = vec![seg("a", 0, 900), seg("b", 900, 2100), seg("c", 2100, 3000)];
        let spans = vec![span("Speaker 1", 0, 1500), span("Speaker 2", 1500, 3000)];

        let utterances = align(&segments, &spans);
        assert_eq!(utterances.len(), segments.len());
        for (u, s) in utterances.iter().zip(&segments) {
            assert_eq!(u.text, s.text);
            assert_eq!((u.start_ms, u.end_ms), (s.start_ms, s.end_ms));
        }
    }

    #[test]
    fn picks_span_with_maximal_overlap() {
        // Segment 900..2100 overlaps Speaker 1 by 600ms and Speaker 2 by 600ms
        // — tie, so the earlier-starting span wins. Shift the boundary and the
        // bigger overlap wins.
        let segments = vec![seg("tie", 900, 2100), seg("later", 1200, 2100)];
        let spans = vec![span("Speaker 1", 0, 1500), span("Speaker 2", 1500, 3000)];

        let utterances = align(&segments, &spans);
        assert_eq!(utterances[0].speaker, "Speaker 1");
        assert_eq!(utterances[1].speaker, "Speaker 2");
    }

    #[test]
    fn gap_segments_share_one_synthetic_identity() {
        // Two consecutive segments in an undiarized region share a label;
        // a later, separate gap region gets a fresh one.
        let segments = vec![
            seg("covered", 0, 1000),
            seg("gap1", 1000, 1500),
            seg("gap2", 1500, 2000),
            seg("covered again", 2000, 3000),
            seg("other gap", 3000, 3500),
        ];
        let spans = vec![span("Speaker 1", 0, 1000), span("Speaker 1", 2000, 3000)];

        let utterances = align(&segments, &spans);
        assert_eq!(utterances[1].speaker, "Unknown Speaker 1");
        assert_eq!(utterances[2].speaker, "Unknown Speaker 1");
        assert_eq!(utterances[3].speaker, "Speaker 1");
        assert_eq!(utterances[4].speaker, "Unknown Speaker 2");
    }

    #[test]
    fn alignment_is_deterministic() {
        let segments = vec![seg("a", 0, 1000), seg("b", 1000, 2000)];
        let spans = vec![span("Speaker 1", 0, 2000)];
        assert_eq!(align(&segments, &spans), align(&segments, &spans));
    }

    #[test]
    fn empty_spans_make_everything_one_unknown() {
        let segments = vec![seg("a", 0, 1000), seg("b", 1000, 2000)];
        let utterances = align(&segments, &[]);
        assert!(utterances.iter().all(|u| u.speaker == "Unknown Speaker 1"));
    }
}
