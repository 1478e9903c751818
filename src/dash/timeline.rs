//! Pure algebra over `SegmentTimeline` tuples.
//!
//! A timeline is a compact run-length encoding of segment start times. All
//! three operations here share the same cursor rule: walking the tuples in
//! order, a present and non-zero `t` resets the cursor, and every emitted
//! segment advances it by one duration.

use std::collections::BTreeMap;

use crate::dash::mpd::{SegmentTimeline, S};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandedSegment {
    pub start: u64,
    pub duration: u64,
}

/// Materialize every segment described by the timeline, in order.
pub fn expand(timeline: &SegmentTimeline) -> Vec<ExpandedSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0u64;

    for s in &timeline.segments {
        if let Some(t) = s.t {
            if t > 0 {
                cursor = t;
            }
        }
        for _ in 0..=s.r {
            segments.push(ExpandedSegment {
                start: cursor,
                duration: s.d,
            });
            cursor += s.d;
        }
    }

    segments
}

/// Merge a refreshed timeline into the current one.
///
/// Tuples are keyed by their materialized start tick; a tuple present in both
/// timelines is taken from `new`. The result is sorted ascending, so merging
/// the sliding window an origin re-advertises on every refresh is idempotent.
pub fn merge(old: &SegmentTimeline, new: &SegmentTimeline) -> SegmentTimeline {
    let mut by_start: BTreeMap<u64, S> = BTreeMap::new();

    for (start, s) in materialize(old) {
        by_start.insert(start, s);
    }
    for (start, s) in materialize(new) {
        by_start.insert(start, s);
    }

    SegmentTimeline {
        segments: by_start.into_values().collect(),
    }
}

/// Resolve each tuple's start tick and pin it as an explicit `t`, so merged
/// tuples stay stable however the origin chose to elide them.
fn materialize(timeline: &SegmentTimeline) -> Vec<(u64, S)> {
    let mut out = Vec::with_capacity(timeline.segments.len());
    let mut cursor = 0u64;

    for s in &timeline.segments {
        if let Some(t) = s.t {
            if t > 0 {
                cursor = t;
            }
        }
        out.push((cursor, S { t: Some(cursor), ..*s }));
        cursor += (s.r + 1) * s.d;
    }

    out
}

/// Find the segment whose half-open interval `[start, start + duration)`
/// contains `playhead`.
///
/// Past the known end of the timeline the last segment is returned, which
/// keeps a caller pinned to the live edge until a refresh extends the
/// timeline. An empty timeline yields `(0, 0)`.
pub fn segment_at(timeline: &SegmentTimeline, playhead: u64) -> ExpandedSegment {
    let expanded = expand(timeline);

    for segment in &expanded {
        if playhead < segment.start + segment.duration {
            return *segment;
        }
    }

    expanded.last().copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(tuples: &[(Option<u64>, u64, u64)]) -> SegmentTimeline {
        SegmentTimeline {
            segments: tuples.iter().map(|&(t, d, r)| S { t, d, r }).collect(),
        }
    }

    #[test]
    fn test_expand_repeats_and_resets() {
        let timeline = timeline(&[(Some(100), 10, 2), (None, 5, 0), (Some(200), 20, 0)]);
        let expanded = expand(&timeline);
        assert_eq!(
            expanded,
            vec![
                ExpandedSegment { start: 100, duration: 10 },
                ExpandedSegment { start: 110, duration: 10 },
                ExpandedSegment { start: 120, duration: 10 },
                ExpandedSegment { start: 130, duration: 5 },
                ExpandedSegment { start: 200, duration: 20 },
            ]
        );
    }

    #[test]
    fn test_segment_at_within_and_past_end() {
        let timeline = timeline(&[(Some(0), 10, 1), (Some(20), 12, 0)]);

        assert_eq!(
            segment_at(&timeline, 15),
            ExpandedSegment { start: 10, duration: 10 }
        );
        // Past the edge: clamp to the last known segment.
        assert_eq!(
            segment_at(&timeline, 1_000),
            ExpandedSegment { start: 20, duration: 12 }
        );
        assert_eq!(
            segment_at(&SegmentTimeline::default(), 5),
            ExpandedSegment::default()
        );
    }

    #[test]
    fn test_merge_new_wins() {
        let old = timeline(&[(Some(0), 10, 0), (Some(10), 10, 0)]);
        let new = timeline(&[(Some(10), 12, 0), (Some(22), 10, 0)]);
        let merged = merge(&old, &new);
        assert_eq!(
            merged,
            timeline(&[(Some(0), 10, 0), (Some(10), 12, 0), (Some(22), 10, 0)])
        );
    }
}
