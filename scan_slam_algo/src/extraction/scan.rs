//! Raw laser sweeps and the beam geometry needed to interpret them.

use serde::{Deserialize, Serialize};

use crate::util::{Point, FRAC_PI_2};

/// Beam layout of the planar range finder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserGeometry {
    /// Number of beams per sweep
    pub count: usize,
    /// Angle of the first beam relative to the heading (radians)
    pub min_theta: f64,
    /// Angle of the last beam (radians)
    pub max_theta: f64,
    /// Longest distance that still counts as a return
    pub max_distance: f64,
}

impl Default for LaserGeometry {
    fn default() -> Self {
        Self {
            count: 181,
            min_theta: -FRAC_PI_2,
            max_theta: FRAC_PI_2,
            max_distance: 500.0,
        }
    }
}

impl LaserGeometry {
    /// Sentinel stored for beams without a return.
    pub fn invalid_distance(&self) -> f64 {
        self.max_distance + 1.0
    }

    pub fn is_valid(&self, distance: f64) -> bool {
        distance.is_finite() && distance >= 0.0 && distance <= self.max_distance
    }

    /// Angular spacing between neighbouring beams.
    pub fn resolution(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.max_theta - self.min_theta) / (self.count - 1) as f64
    }

    /// Beam angle relative to the sensor heading.
    pub fn beam_angle(&self, index: usize) -> f64 {
        self.min_theta + self.resolution() * index as f64
    }
}

/// One sweep: a distance per beam (or the invalid sentinel) and the tick it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScan {
    pub distances: Vec<f64>,
    pub timestamp: u64,
}

impl RawScan {
    pub fn new(distances: Vec<f64>, timestamp: u64) -> Self {
        Self {
            distances,
            timestamp,
        }
    }

    pub fn valid_count(&self, geometry: &LaserGeometry) -> usize {
        self.distances
            .iter()
            .filter(|&&d| geometry.is_valid(d))
            .count()
    }

    /// World-frame endpoints of all valid beams, in beam order, for a sensor at
    /// `origin` facing `heading`.
    pub fn project(&self, geometry: &LaserGeometry, origin: &Point, heading: f64) -> Vec<Point> {
        self.distances
            .iter()
            .enumerate()
            .filter(|(_, &d)| geometry.is_valid(d))
            .map(|(i, &d)| {
                let angle = heading + geometry.beam_angle(i);
                origin + Point::new(angle.cos(), angle.sin()) * d
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_beam_angles() {
        let geometry = LaserGeometry::default();
        assert_relative_eq!(geometry.beam_angle(0), -FRAC_PI_2);
        assert_relative_eq!(geometry.beam_angle(90), 0.0, epsilon = 1e-12);
        assert_relative_eq!(geometry.beam_angle(180), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_skips_invalid() {
        let geometry = LaserGeometry {
            count: 3,
            ..Default::default()
        };
        let scan = RawScan::new(vec![10.0, geometry.invalid_distance(), 20.0], 7);
        let points = scan.project(&geometry, &Point::new(1.0, 0.0), 0.0);
        assert_eq!(scan.valid_count(&geometry), 2);
        assert_eq!(points.len(), 2);
        assert_relative_eq!(points[0], Point::new(1.0, -10.0), epsilon = 1e-9);
        assert_relative_eq!(points[1], Point::new(1.0, 20.0), epsilon = 1e-9);
    }
}
