//! Simulated planar range finder.

use scan_slam_algo::extraction::{LaserGeometry, RawScan};
use scan_slam_algo::util::Point;
use serde::{Deserialize, Serialize};

use crate::scene::Scene;
use crate::simulator::common::NoiseSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserNoiseConfig {
    /// Bound of the uniform range error
    pub distance_error: f64,
    /// Bound of the uniform beam angle error, as a fraction of the resolution
    pub angle_error: f64,
}

impl Default for LaserNoiseConfig {
    fn default() -> Self {
        Self {
            distance_error: 5.0,
            angle_error: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaserSensor {
    geometry: LaserGeometry,
    noise: LaserNoiseConfig,
}

impl LaserSensor {
    pub fn new(geometry: LaserGeometry, noise: LaserNoiseConfig) -> Self {
        Self { geometry, noise }
    }

    pub fn geometry(&self) -> &LaserGeometry {
        &self.geometry
    }

    /// Sweep the scene from `origin` facing `heading`.
    ///
    /// Beams with no wall inside the max range, or whose noisy reading leaves
    /// the valid range, report the invalid sentinel.
    pub fn scan(
        &self,
        scene: &Scene,
        origin: &Point,
        heading: f64,
        timestamp: u64,
        noise: &mut NoiseSource,
    ) -> RawScan {
        let geometry = &self.geometry;
        let invalid = geometry.invalid_distance();
        let angle_limit = self.noise.angle_error * geometry.resolution();

        let distances = (0..geometry.count)
            .map(|i| {
                let angle = heading + geometry.beam_angle(i) + noise.uniform(angle_limit);
                let direction = Point::new(angle.cos(), angle.sin());
                match scene.cast_ray(origin, &direction) {
                    Some(d) if d < geometry.max_distance => {
                        let noisy = d + noise.uniform(self.noise.distance_error);
                        if geometry.is_valid(noisy) {
                            noisy
                        } else {
                            invalid
                        }
                    }
                    _ => invalid,
                }
            })
            .collect();
        RawScan::new(distances, timestamp)
    }
}
