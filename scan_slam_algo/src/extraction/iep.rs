//! Iterative End-Point fit.
//!
//! A run of points is approximated by the chord between its first and last
//! point. If some point strays further than `epsilon` from that chord the run
//! is split at the worst offender and both halves are handled the same way.
//! The result is fully determined by the input.

use std::ops::Range;

use super::geometry::{perpendicular_distance, LineSegmentFeature};
use crate::util::Point;

/// Sorted indices of the split points, always including the first and last index.
pub fn iep_breakpoints(points: &[Point], epsilon: f64) -> Vec<usize> {
    match points.len() {
        0 => Vec::new(),
        1 => vec![0],
        n => {
            let mut breaks = vec![0];
            split(points, 0, n - 1, epsilon, &mut breaks);
            breaks.push(n - 1);
            breaks
        }
    }
}

fn split(points: &[Point], first: usize, last: usize, epsilon: f64, out: &mut Vec<usize>) {
    if last <= first + 1 {
        return;
    }
    let (a, b) = (&points[first], &points[last]);
    let mut max_distance = 0.0;
    let mut max_index = first;
    for (i, p) in points.iter().enumerate().take(last).skip(first + 1) {
        // A closed run has no chord; fall back to the distance from its end.
        let d = perpendicular_distance(a, b, p).unwrap_or_else(|| (p - a).norm());
        if d > max_distance {
            max_distance = d;
            max_index = i;
        }
    }
    if max_distance > epsilon {
        split(points, first, max_index, epsilon, out);
        out.push(max_index);
        split(points, max_index, last, epsilon, out);
    }
}

/// Chords between consecutive breakpoints.
pub fn iep_segments(points: &[Point], epsilon: f64) -> Vec<LineSegmentFeature> {
    iep_breakpoints(points, epsilon)
        .windows(2)
        .map(|w| LineSegmentFeature::new(points[w[0]], points[w[1]]))
        .collect()
}

/// Disjoint index ranges covering `points`, one per chord.
///
/// A breakpoint shared by two chords belongs to the earlier range.
pub fn iep_partitions(points: &[Point], epsilon: f64) -> Vec<Range<usize>> {
    let breaks = iep_breakpoints(points, epsilon);
    if breaks.len() < 2 {
        return breaks.iter().map(|&b| b..b + 1).collect();
    }
    let mut ranges = Vec::with_capacity(breaks.len() - 1);
    let mut start = 0;
    for &b in &breaks[1..] {
        ranges.push(start..b + 1);
        start = b + 1;
    }
    ranges
}
