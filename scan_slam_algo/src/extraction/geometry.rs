//! Planar primitives shared by the line fitters.

use crate::util::Point;

/// A straight wall piece seen in one scan. Rebuilt from scratch every scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegmentFeature {
    pub start: Point,
    pub end: Point,
}

impl LineSegmentFeature {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Whether `p` lies in the axis-aligned bounding box of the segment grown by `margin`.
    pub fn bbox_contains(&self, p: &Point, margin: f64) -> bool {
        let (min_x, max_x) = min_max(self.start.x, self.end.x);
        let (min_y, max_y) = min_max(self.start.y, self.end.y);
        p.x >= min_x - margin && p.x <= max_x + margin && p.y >= min_y - margin && p.y <= max_y + margin
    }

    /// Intersection of the infinite lines through both segments.
    ///
    /// Returns `None` for degenerate segments and for pairs whose unit
    /// directions have a cross product below `det_epsilon` (near parallel).
    pub fn line_intersection(&self, other: &Self, det_epsilon: f64) -> Option<Point> {
        let d1 = (self.end - self.start).try_normalize(f64::EPSILON)?;
        let d2 = (other.end - other.start).try_normalize(f64::EPSILON)?;
        // Solve start1 + t·d1 = start2 + s·d2
        let det = d1.x * (-d2.y) - d1.y * (-d2.x);
        if det.abs() < det_epsilon {
            return None;
        }
        let rhs = other.start - self.start;
        let t = (rhs.x * (-d2.y) - rhs.y * (-d2.x)) / det;
        Some(self.start + d1 * t)
    }
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Distance from `p0` to the line through `p1` and `p2`.
///
/// `None` when `p1 == p2`, since the line is undefined.
pub fn perpendicular_distance(p1: &Point, p2: &Point, p0: &Point) -> Option<f64> {
    let dy = p2.y - p1.y;
    let dx = p2.x - p1.x;
    let den = (dy * dy + dx * dx).sqrt();
    if den <= f64::EPSILON {
        return None;
    }
    let num = (dy * p0.x - dx * p0.y + p2.x * p1.y - p2.y * p1.x).abs();
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perpendicular_distance() {
        let d = perpendicular_distance(&Point::new(0.0, 0.0), &Point::new(10.0, 0.0), &Point::new(3.0, 4.0));
        assert_relative_eq!(d.unwrap(), 4.0);
        assert!(perpendicular_distance(&Point::new(1.0, 1.0), &Point::new(1.0, 1.0), &Point::zeros()).is_none());
    }

    #[test]
    fn test_line_intersection() {
        let a = LineSegmentFeature::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = LineSegmentFeature::new(Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        let p = a.line_intersection(&b, 1e-6).unwrap();
        assert_relative_eq!(p, Point::new(5.0, 5.0), epsilon = 1e-9);

        // Vertical against horizontal
        let v = LineSegmentFeature::new(Point::new(3.0, -5.0), Point::new(3.0, 5.0));
        let h = LineSegmentFeature::new(Point::new(-5.0, 1.0), Point::new(5.0, 1.0));
        assert_relative_eq!(v.line_intersection(&h, 1e-6).unwrap(), Point::new(3.0, 1.0), epsilon = 1e-9);
    }

    #[test]
    fn test_parallel_lines_do_not_intersect() {
        let a = LineSegmentFeature::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let b = LineSegmentFeature::new(Point::new(0.0, 2.0), Point::new(5.0, 2.0));
        assert!(a.line_intersection(&b, 1e-6).is_none());
    }

    #[test]
    fn test_bbox_margin() {
        let s = LineSegmentFeature::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!(s.bbox_contains(&Point::new(11.0, 0.5), 2.0));
        assert!(!s.bbox_contains(&Point::new(13.0, 0.0), 2.0));
    }
}
