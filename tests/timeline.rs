use dashls::dash::{
    mpd::{SegmentTimeline, S},
    timeline::{expand, merge, segment_at, ExpandedSegment},
};

fn timeline(tuples: &[(u64, u64)]) -> SegmentTimeline {
    SegmentTimeline {
        segments: tuples
            .iter()
            .map(|&(t, d)| S {
                t: Some(t),
                d,
                r: 0,
            })
            .collect(),
    }
}

#[test]
fn test_expand_contiguous_runs() {
    let timeline = SegmentTimeline {
        segments: vec![
            S {
                t: Some(100),
                d: 10,
                r: 2,
            },
            S { t: None, d: 20, r: 1 },
        ],
    };

    let starts: Vec<_> = expand(&timeline).iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![100, 110, 120, 130, 150]);
}

#[test]
fn test_merge_non_overlapping() {
    let old = timeline(&[(0, 10), (10, 10)]);
    let new = timeline(&[(20, 10), (30, 10)]);

    let merged = merge(&old, &new);
    let starts: Vec<_> = merged.segments.iter().map(|s| s.t.unwrap()).collect();
    assert_eq!(starts, vec![0, 10, 20, 30]);
}

#[test]
fn test_merge_overlapping_new_wins() {
    let old = timeline(&[(0, 10), (10, 10)]);
    let new = timeline(&[(10, 12), (22, 10)]);

    let merged = merge(&old, &new);
    assert_eq!(merged.segments.len(), 3);
    assert_eq!(merged.segments[0], S { t: Some(0), d: 10, r: 0 });
    assert_eq!(merged.segments[1], S { t: Some(10), d: 12, r: 0 });
    assert_eq!(merged.segments[2], S { t: Some(22), d: 10, r: 0 });
}

#[test]
fn test_merge_subset() {
    let old = timeline(&[(0, 10), (10, 10), (20, 10)]);
    let new = timeline(&[(10, 10)]);

    let merged = merge(&old, &new);
    let starts: Vec<_> = merged.segments.iter().map(|s| s.t.unwrap()).collect();
    assert_eq!(starts, vec![0, 10, 20]);
}

#[test]
fn test_merge_empty_sides() {
    let some = timeline(&[(10, 10)]);
    let empty = SegmentTimeline::default();

    assert_eq!(merge(&empty, &some), some);
    assert_eq!(merge(&some, &empty), some);
}

#[test]
fn test_merge_idempotent() {
    let a = timeline(&[(0, 10), (10, 12), (22, 10)]);
    assert_eq!(merge(&a, &a), a);
}

#[test]
fn test_segment_at_half_open_intervals() {
    let timeline = timeline(&[(0, 10), (10, 10)]);

    assert_eq!(segment_at(&timeline, 0), ExpandedSegment { start: 0, duration: 10 });
    assert_eq!(segment_at(&timeline, 9), ExpandedSegment { start: 0, duration: 10 });
    // The boundary tick belongs to the next segment.
    assert_eq!(segment_at(&timeline, 10), ExpandedSegment { start: 10, duration: 10 });
}

#[test]
fn test_segment_at_past_end_returns_last() {
    let timeline = timeline(&[(0, 10), (10, 10)]);
    assert_eq!(
        segment_at(&timeline, 10_000),
        ExpandedSegment { start: 10, duration: 10 }
    );
}

#[test]
fn test_segment_at_empty_timeline() {
    assert_eq!(
        segment_at(&SegmentTimeline::default(), 42),
        ExpandedSegment { start: 0, duration: 0 }
    );
}
