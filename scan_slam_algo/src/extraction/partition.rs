//! Splitting a sweep at range discontinuities, and the loose-end landmarks
//! found at those splits.

use std::ops::Range;

use super::scan::LaserGeometry;
use crate::util::Point;

/// A run of consecutive valid returns with no range jump between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPartition {
    /// Indices into the valid-point list
    pub points: Range<usize>,
    /// Beam index of the first point
    pub first_beam: usize,
    /// Beam index of the last point
    pub last_beam: usize,
}

impl ScanPartition {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Thresholds that decide where a sweep is split.
#[derive(Debug, Clone, Copy)]
pub struct DiscontinuityRule {
    /// Jump between two valid neighbours that starts a new partition
    pub discontinuity_threshold: f64,
    /// Jump into or out of the invalid sentinel that starts a new partition
    pub lower_landmark_margin: f64,
}

impl DiscontinuityRule {
    fn is_break(&self, geometry: &LaserGeometry, prev: f64, cur: f64) -> bool {
        let jump = (cur - prev).abs();
        match (geometry.is_valid(prev), geometry.is_valid(cur)) {
            (true, true) => jump > self.discontinuity_threshold,
            (false, false) => false,
            _ => jump > self.lower_landmark_margin,
        }
    }
}

/// Partition the valid returns of `distances` (walked in beam order).
///
/// Every valid beam ends up in exactly one partition and partitions are
/// emitted in beam order.
pub fn partition_scan(
    distances: &[f64],
    geometry: &LaserGeometry,
    rule: &DiscontinuityRule,
) -> Vec<ScanPartition> {
    let mut partitions = Vec::new();
    let mut current: Option<ScanPartition> = None;
    let mut pending_break = false;
    let mut point_idx = 0;

    for (beam, &d) in distances.iter().enumerate() {
        if beam > 0 && rule.is_break(geometry, distances[beam - 1], d) {
            pending_break = true;
        }
        if !geometry.is_valid(d) {
            continue;
        }
        match current.as_mut() {
            Some(partition) if !pending_break => {
                partition.points.end = point_idx + 1;
                partition.last_beam = beam;
            }
            _ => {
                if let Some(done) = current.take() {
                    partitions.push(done);
                }
                current = Some(ScanPartition {
                    points: point_idx..point_idx + 1,
                    first_beam: beam,
                    last_beam: beam,
                });
            }
        }
        pending_break = false;
        point_idx += 1;
    }
    if let Some(done) = current {
        partitions.push(done);
    }
    partitions
}

/// Corner candidates at the two ends of each partition.
///
/// An end is kept only when the partition is large enough to hold a line, the
/// end is not the edge of the sweep, it is not near max range, and it is the
/// nearer side of the jump (the farther side is an occlusion shadow).
pub fn loose_end_landmarks(
    partitions: &[ScanPartition],
    points: &[Point],
    distances: &[f64],
    geometry: &LaserGeometry,
    min_points: usize,
    discontinuity_threshold: f64,
) -> Vec<Point> {
    let near_max = |d: f64| geometry.max_distance - d < discontinuity_threshold;
    let mut landmarks = Vec::new();

    for partition in partitions.iter().filter(|p| p.len() >= min_points) {
        let first = partition.first_beam;
        if first > 0 && !near_max(distances[first]) && distances[first] <= distances[first - 1] {
            landmarks.push(points[partition.points.start]);
        }

        let last = partition.last_beam;
        if last + 1 < distances.len()
            && !near_max(distances[last])
            && distances[last] <= distances[last + 1]
        {
            landmarks.push(points[partition.points.end - 1]);
        }
    }
    landmarks
}
