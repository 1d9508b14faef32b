//! Corner landmarks where extracted lines meet.

use std::cmp::Ordering;

use super::geometry::LineSegmentFeature;
use crate::util::Point;

/// Scan points that sit on the intersection of two extracted lines.
///
/// For each non-parallel pair the intersection is snapped to the nearest scan
/// point. The snapped point is kept if it is within `margin` of the
/// intersection and inside both segments' bounding boxes grown by `margin`.
pub fn intersection_landmarks(
    lines: &[LineSegmentFeature],
    points: &[Point],
    margin: f64,
    det_epsilon: f64,
) -> Vec<Point> {
    let mut landmarks = Vec::new();
    for (i, a) in lines.iter().enumerate() {
        for b in &lines[i + 1..] {
            let Some(crossing) = a.line_intersection(b, det_epsilon) else {
                continue;
            };
            let Some(nearest) = nearest_point(points, &crossing) else {
                continue;
            };
            if (nearest - crossing).norm() <= margin
                && a.bbox_contains(&nearest, margin)
                && b.bbox_contains(&nearest, margin)
            {
                landmarks.push(nearest);
            }
        }
    }
    landmarks
}

fn nearest_point(points: &[Point], target: &Point) -> Option<Point> {
    points
        .iter()
        .min_by(|p, q| {
            (*p - target)
                .norm_squared()
                .partial_cmp(&(*q - target).norm_squared())
                .unwrap_or(Ordering::Equal)
        })
        .copied()
}
