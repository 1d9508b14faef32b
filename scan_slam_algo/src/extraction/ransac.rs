//! RANSAC line extraction with optional least-squares refinement.
//!
//! Lines are pulled out of a point pool one at a time: the two-point sample
//! with the most inliers wins, its inliers leave the pool, and the search
//! repeats until nothing convincing is left.

use log::trace;
use nalgebra::{Matrix2, Vector2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometry::{perpendicular_distance, LineSegmentFeature};
use crate::util::{try_inverse2, Point};

/// RANSAC tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Two-point samples drawn per extracted line
    pub iterations: usize,
    /// Perpendicular distance below which a point is an inlier
    pub inlier_threshold: f64,
    /// A line needs strictly more inliers than this
    pub min_inliers: usize,
    /// Inlier x-spread below which the refit uses `x = const`
    pub vertical_line_threshold: f64,
    /// Random seed (None = from entropy)
    pub seed: Option<u64>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            inlier_threshold: 4.0,
            min_inliers: 8,
            vertical_line_threshold: 20.0,
            seed: None,
        }
    }
}

/// Extract every line RANSAC can find in `points`.
pub fn ransac_lines<R: Rng + ?Sized>(
    points: &[Point],
    config: &RansacConfig,
    least_squares: bool,
    rng: &mut R,
) -> Vec<LineSegmentFeature> {
    let mut pool = points.to_vec();
    let mut lines = Vec::new();

    while pool.len() >= 2 {
        let inliers = best_inlier_set(&pool, config, rng);
        if inliers.len() <= config.min_inliers {
            break;
        }
        let inlier_points: Vec<Point> = inliers.iter().map(|&i| pool[i]).collect();
        let segment = if least_squares {
            least_squares_segment(&inlier_points, config.vertical_line_threshold)
                .unwrap_or_else(|| chord(&inlier_points))
        } else {
            chord(&inlier_points)
        };
        trace!(
            "ransac line ({:.1}, {:.1}) -> ({:.1}, {:.1}) with {} inliers",
            segment.start.x,
            segment.start.y,
            segment.end.x,
            segment.end.y,
            inliers.len()
        );
        lines.push(segment);

        let mut is_inlier = vec![false; pool.len()];
        for &i in &inliers {
            is_inlier[i] = true;
        }
        let mut idx = 0;
        pool.retain(|_| {
            let keep = !is_inlier[idx];
            idx += 1;
            keep
        });

        if pool.len() < config.min_inliers + 2 {
            break;
        }
    }
    lines
}

/// Indices (ascending) of the largest consensus set among the sampled lines.
fn best_inlier_set<R: Rng + ?Sized>(pool: &[Point], config: &RansacConfig, rng: &mut R) -> Vec<usize> {
    let n = pool.len();
    let mut best = Vec::new();
    for _ in 0..config.iterations {
        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        if a == b {
            continue;
        }
        let (p1, p2) = (&pool[a], &pool[b]);
        let mut inliers = Vec::new();
        for (k, p) in pool.iter().enumerate() {
            match perpendicular_distance(p1, p2, p) {
                Some(d) if d < config.inlier_threshold => inliers.push(k),
                Some(_) => {}
                // Coincident sample points define no line.
                None => break,
            }
        }
        if inliers.len() > best.len() {
            best = inliers;
        }
    }
    best
}

fn chord(inliers: &[Point]) -> LineSegmentFeature {
    let first = inliers.first().copied().unwrap_or_else(Point::zeros);
    let last = inliers.last().copied().unwrap_or(first);
    LineSegmentFeature::new(first, last)
}

/// Refit the inliers by ordinary least squares and clip to the first and last inlier.
///
/// Regresses `y` on `x`, or uses `x = mean(min x, max x)` when the x-spread is
/// below `vertical_threshold`. `None` when the normal equations are singular.
pub fn least_squares_segment(inliers: &[Point], vertical_threshold: f64) -> Option<LineSegmentFeature> {
    let first = inliers.first()?;
    let last = inliers.last()?;
    let (min_x, max_x) = inliers
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));

    if max_x - min_x < vertical_threshold {
        let x = 0.5 * (min_x + max_x);
        return Some(LineSegmentFeature::new(Point::new(x, first.y), Point::new(x, last.y)));
    }

    // Normal equations XᵀX·α = XᵀY with rows [1, x]
    let n = inliers.len() as f64;
    let (sx, sy, sxx, sxy) = inliers.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, p| {
        (acc.0 + p.x, acc.1 + p.y, acc.2 + p.x * p.x, acc.3 + p.x * p.y)
    });
    let xtx = Matrix2::new(n, sx, sx, sxx);
    let alpha = try_inverse2(&xtx)? * Vector2::new(sy, sxy);
    let (c, m) = (alpha[0], alpha[1]);

    Some(LineSegmentFeature::new(
        project_onto_line(m, c, first),
        project_onto_line(m, c, last),
    ))
}

/// Orthogonal projection of `p` onto `y = m·x + c`.
fn project_onto_line(m: f64, c: f64, p: &Point) -> Point {
    let x = (p.x + m * (p.y - c)) / (1.0 + m * m);
    Point::new(x, m * x + c)
}
