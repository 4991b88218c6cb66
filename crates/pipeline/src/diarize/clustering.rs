//! Pure clustering logic behind the diarizer: window-to-cluster assignment,
//! span building, and the short-span merge/drop policy. Kept free of any
//! model or I/O so it is testable with hand-built embeddings.

use crate::matcher::cosine_similarity;

/// One analysis window with its speaker embedding.
#[derive(Debug, Clone)]
pub struct Window {
    pub start_ms: u64,
    pub end_ms: u64,
    pub embedding: Vec<f32>,
}

/// A contiguous run of windows assigned to one cluster index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpan {
    pub cluster: usize,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl RawSpan {
    fn len_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Assigns each window to a cluster by cosine similarity against running
/// centroids: join the best-matching cluster at or above `threshold`, else
/// open a new one. Cluster indices are dense and ordered by first appearance.
pub fn assign_clusters(windows: &[Window], threshold: f32) -> Vec<usize> {
    struct Centroid {
        sum: Vec<f32>,
        count: usize,
    }

    impl Centroid {
        fn mean(&self) -> Vec<f32> {
            self.sum.iter().map(|v| v / self.count as f32).collect()
        }
    }

    let mut centroids: Vec<Centroid> = Vec::new();
    let mut assignments = Vec::with_capacity(windows.len());

    for window in windows {
        let best = centroids
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, cosine_similarity(&window.embedding, &c.mean())))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let cluster = match best {
            Some((idx, sim)) if sim >= threshold => idx,
            _ => {
                centroids.push(Centroid {
                    sum: vec![0.0; window.embedding.len()],
                    count: 0,
                });
                centroids.len() - 1
            }
        };

        let c = &mut centroids[cluster];
        for (acc, v) in c.sum.iter_mut().zip(&window.embedding) {
            *acc += v;
        }
        c.count += 1;
        assignments.push(cluster);
    }

    assignments
}

/// Merges temporally contiguous windows of the same cluster into spans.
pub fn build_spans(windows: &[Window], assignments: &[usize]) -> Vec<RawSpan> {
    let mut spans: Vec<RawSpan> = Vec::new();

    for (window, &cluster) in windows.iter().zip(assignments) {
        match spans.last_mut() {
            Some(last) if last.cluster == cluster && last.end_ms == window.start_ms => {
                last.end_ms = window.end_ms;
            }
            _ => spans.push(RawSpan {
                cluster,
                start_ms: window.start_ms,
                end_ms: window.end_ms,
            }),
        }
    }

    spans
}

/// Enforces the minimum-span policy: a span shorter than `min_span_ms` is
/// merged into a contiguous neighbour of the same cluster when one exists,
/// otherwise dropped as noise (too short to carry a reliable embedding).
/// Removing a noise span can make its neighbours contiguous, so the pass
/// repeats until stable.
pub fn apply_min_span_policy(mut spans: Vec<RawSpan>, min_span_ms: u64) -> Vec<RawSpan> {
    loop {
        coalesce(&mut spans);

        let Some(idx) = spans.iter().position(|s| s.len_ms() < min_span_ms) else {
            return spans;
        };

        let prev_contiguous = idx > 0
            && spans[idx - 1].cluster == spans[idx].cluster
            && spans[idx - 1].end_ms == spans[idx].start_ms;
        let next_contiguous = idx + 1 < spans.len()
            && spans[idx + 1].cluster == spans[idx].cluster
            && spans[idx].end_ms == spans[idx + 1].start_ms;

        if prev_contiguous {
            spans[idx - 1].end_ms = spans[idx].end_ms;
            spans.remove(idx);
        } else if next_contiguous {
            spans[idx + 1].start_ms = spans[idx].start_ms;
            spans.remove(idx);
        } else {
            spans.remove(idx);
        }
    }
}

fn coalesce(spans: &mut Vec<RawSpan>) {
    let mut i = 0;
    while i + 1 < spans.len() {
        if spans[i].cluster == spans[i + 1].cluster && spans[i].end_ms == spans[i + 1].start_ms {
            spans[i].end_ms = spans[i + 1].end_ms;
            spans.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

/// L2-normalized centroid per cluster over its member windows.
pub fn centroids(windows: &[Window], assignments: &[usize], n_clusters: usize) -> Vec<Vec<f32>> {
    let dim = windows.first().map(|w| w.embedding.len()).unwrap_or(0);
    let mut sums = vec![vec![0.0f32; dim]; n_clusters];
    let mut counts = vec![0usize; n_clusters];

    for (window, &cluster) in windows.iter().zip(assignments) {
        for (acc, v) in sums[cluster].iter_mut().zip(&window.embedding) {
            *acc += v;
        }
        counts[cluster] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count == 0 {
                return sum;
            }
            let mean: Vec<f32> = sum.into_iter().map(|v| v / count as f32).collect();
            let norm = mean.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > f32::EPSILON {
                mean.into_iter().map(|v| v / norm).collect()
            } else {
                mean
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start_ms: u64, end_ms: u64, embedding: &[f32]) -> Window {
        Window {
            start_ms,
            end_ms,
            embedding: embedding.to_vec(),
        }
    }

    #[test]
    fn identical_voices_form_one_cluster() {
        let windows: Vec<Window> = (0..5)
            .map(|i| window(i * 1000, (i + 1) * 1000, &[1.0, 0.0]))
            .collect();
        let assignments = assign_clusters(&windows, 0.7);
        assert!(assignments.iter().all(|&c| c == 0));

        let spans = build_spans(&windows, &assignments);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_ms, 0);
        assert_eq!(spans[0].end_ms, 5000);
    }

    #[test]
    fn orthogonal_voices_form_two_clusters() {
        let windows = vec![
            window(0, 1000, &[1.0, 0.0]),
            window(1000, 2000, &[1.0, 0.0]),
            window(2000, 3000, &[0.0, 1.0]),
            window(3000, 4000, &[0.0, 1.0]),
        ];
        let assignments = assign_clusters(&windows, 0.7);
        assert_eq!(assignments, vec![0, 0, 1, 1]);

        let spans = build_spans(&windows, &assignments);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].cluster, 0);
        assert_eq!(spans[1].cluster, 1);
    }

    #[test]
    fn non_contiguous_windows_split_spans() {
        // Silence gap between 1000 and 3000
        let windows = vec![
            window(0, 1000, &[1.0, 0.0]),
            window(3000, 4000, &[1.0, 0.0]),
        ];
        let assignments = assign_clusters(&windows, 0.7);
        let spans = build_spans(&windows, &assignments);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].cluster, spans[1].cluster);
    }

    #[test]
    fn short_interloper_is_dropped_and_neighbours_merge() {
        let spans = vec![
            RawSpan { cluster: 0, start_ms: 0, end_ms: 2000 },
            RawSpan { cluster: 1, start_ms: 2000, end_ms: 2200 },
            RawSpan { cluster: 0, start_ms: 2200, end_ms: 4000 },
        ];
        // The 200ms blip is dropped; the surrounding cluster-0 spans are not
        // contiguous (gap left by the drop stays a gap).
        let out = apply_min_span_policy(spans, 500);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.cluster == 0));
    }

    #[test]
    fn short_span_merges_into_contiguous_same_cluster_neighbour() {
        let spans = vec![
            RawSpan { cluster: 0, start_ms: 0, end_ms: 300 },
            RawSpan { cluster: 0, start_ms: 300, end_ms: 2000 },
        ];
        let out = apply_min_span_policy(spans, 500);
        assert_eq!(out, vec![RawSpan { cluster: 0, start_ms: 0, end_ms: 2000 }]);
    }

    #[test]
    fn isolated_short_span_is_dropped() {
        let spans = vec![
            RawSpan { cluster: 0, start_ms: 0, end_ms: 2000 },
            RawSpan { cluster: 1, start_ms: 5000, end_ms: 5300 },
        ];
        let out = apply_min_span_policy(spans, 500);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cluster, 0);
    }

    #[test]
    fn centroids_are_unit_length_means() {
        let windows = vec![
            window(0, 1000, &[2.0, 0.0]),
            window(1000, 2000, &[4.0, 0.0]),
        ];
        let cents = centroids(&windows, &[0, 0], 1);
        assert_eq!(cents.len(), 1);
        assert!((cents[0][0] - 1.0).abs() < 1e-6);
        assert!(cents[0][1].abs() < 1e-6);
    }
}
