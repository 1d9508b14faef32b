//! Noise calibration: drive a ghost robot at random and measure how far dead
//! reckoning and landmark extraction stray from the truth.
//!
//! The pose samples estimate the process noise as seen over one sample
//! interval; the landmark samples estimate the measurement noise of the
//! configured extractor.

use std::fmt;

use log::{debug, info};
use nalgebra::{SMatrix, SVector, Vector2, Vector3};
use scan_slam_algo::extraction::{LineFeatureExtractor, RawScan};
use scan_slam_algo::slam::MotionIntegrator;
use scan_slam_algo::util::{normalize_angle, Point, Pose};
use serde::{Deserialize, Serialize};

use super::common::NoiseSource;
use super::world::World;
use super::Simulate;
use crate::config::SimConfig;
use crate::error::Result;
use crate::robot::laser_origin;
use crate::scene::Scene;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Ticks between pose samples; a new random control starts after each
    pub sample_every: u64,
    /// Pose samples to collect
    pub samples: usize,
    /// Landmark samples to collect
    pub measurement_samples: usize,
    /// An extracted landmark is paired with a wall corner closer than this
    pub match_distance: f64,
    /// Range of the random forward speed
    pub speed_range: [f64; 2],
    /// Range of the random turn rate
    pub turn_rate_range: [f64; 2],
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_every: 20,
            samples: 100,
            measurement_samples: 100,
            match_distance: 2.0,
            speed_range: [50.0, 150.0],
            turn_rate_range: [0.5, 1.0],
        }
    }
}

/// Sample mean and population covariance of error vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseEstimate<const D: usize> {
    pub mean: SVector<f64, D>,
    pub covariance: SMatrix<f64, D, D>,
    pub samples: usize,
}

impl<const D: usize> NoiseEstimate<D> {
    /// `None` without samples
    pub fn from_samples(samples: &[SVector<f64, D>]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples
            .iter()
            .fold(SVector::<f64, D>::zeros(), |acc, s| acc + s)
            / n;
        let covariance = samples
            .iter()
            .fold(SMatrix::<f64, D, D>::zeros(), |acc, s| {
                let d = s - mean;
                acc + d * d.transpose()
            })
            / n;
        Some(Self {
            mean,
            covariance,
            samples: samples.len(),
        })
    }
}

/// Estimated noise after a calibration run
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    /// Dead-reckoning error `(x, y, θ)` over one sample interval
    pub pose: Option<NoiseEstimate<3>>,
    /// Corner minus extracted landmark
    pub measurement: Option<NoiseEstimate<2>>,
}

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pose {
            Some(pose) => write!(
                f,
                "pose noise from {} samples:{:.6}",
                pose.samples, pose.covariance
            )?,
            None => writeln!(f, "no pose samples")?,
        }
        match &self.measurement {
            Some(m) => write!(
                f,
                "measurement noise from {} samples:{:.6}",
                m.samples, m.covariance
            ),
            None => write!(f, "no landmark matched a corner"),
        }
    }
}

/// Ghost robot under random controls, sampling dead-reckoning and
/// extraction errors against the truth.
pub struct Calibrator {
    config: CalibrationConfig,
    integrator: MotionIntegrator,
    world: World,
    extractor: LineFeatureExtractor,
    corners: Vec<Point>,
    seed: Option<u64>,
    controls: NoiseSource,
    /// Dead reckoning since the last sample
    predicted: Pose,
    pose_errors: Vec<Vector3<f64>>,
    measurement_errors: Vec<Vector2<f64>>,
}

impl Calibrator {
    pub fn new(scene: Scene, config: &SimConfig) -> Self {
        let slam = &config.slam;
        let mut world_config = config.world.clone();
        world_config.ghost = true;
        let seed = world_config.seed.map(|s| s.wrapping_add(1));
        let corners = scene.corners();
        let world = World::new(
            scene,
            config.robot.clone(),
            slam.laser.clone(),
            config.laser_noise.clone(),
            &world_config,
        );
        let mut calibrator = Self {
            config: config.calibration.clone(),
            integrator: slam.ekf.integrator,
            extractor: LineFeatureExtractor::new(slam.extraction.clone(), slam.laser.clone()),
            predicted: world.robot().pose(),
            corners,
            seed,
            controls: NoiseSource::new(seed),
            pose_errors: Vec::new(),
            measurement_errors: Vec::new(),
            world,
        };
        calibrator.random_control();
        calibrator
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn pose_samples(&self) -> usize {
        self.pose_errors.len()
    }

    pub fn measurement_samples(&self) -> usize {
        self.measurement_errors.len()
    }

    pub fn report(&self) -> CalibrationReport {
        CalibrationReport {
            pose: NoiseEstimate::from_samples(&self.pose_errors),
            measurement: NoiseEstimate::from_samples(&self.measurement_errors),
        }
    }

    fn random_control(&mut self) {
        let [v_lo, v_hi] = self.config.speed_range;
        let [w_lo, w_hi] = self.config.turn_rate_range;
        // rand_noise is in [-1, 1]
        let v = v_lo + (v_hi - v_lo) * 0.5 * (self.controls.rand_noise() + 1.0);
        let w = w_lo + (w_hi - w_lo) * 0.5 * (self.controls.rand_noise() + 1.0);
        self.world.robot_mut().apply_control((v, w));
    }

    /// Pair landmarks extracted from the true laser pose with wall corners.
    fn sample_landmarks(&mut self, scan: &RawScan) -> Result<()> {
        let pose = self.world.robot().pose();
        let origin = laser_origin(&pose, self.world.scene().robot_radius());
        let points = scan.project(self.extractor.geometry(), &origin, pose.z);
        let extraction = self.extractor.extract(&points, &scan.distances)?;

        for landmark in &extraction.landmarks {
            if self.measurement_errors.len() >= self.config.measurement_samples {
                break;
            }
            let nearest = self
                .corners
                .iter()
                .map(|c| c - landmark)
                .min_by(|a, b| a.norm().total_cmp(&b.norm()));
            if let Some(error) = nearest.filter(|e| e.norm() < self.config.match_distance) {
                self.measurement_errors.push(error);
            }
        }
        Ok(())
    }

    fn sample_pose(&mut self) {
        let truth = self.world.robot().pose();
        let mut error = self.predicted - truth;
        error.z = normalize_angle(error.z);
        self.pose_errors.push(error);
        self.predicted = truth;
        debug!(
            "calibration sample {}: error ({:.3}, {:.3}, {:.4})",
            self.pose_errors.len(),
            error.x,
            error.y,
            error.z
        );
        if self.pose_errors.len() == self.config.samples {
            info!(
                "calibration done after {} ticks, {} landmark samples",
                self.world.ticks(),
                self.measurement_errors.len()
            );
        }
    }
}

impl Simulate for Calibrator {
    fn label(&self) -> &str {
        "calibration"
    }

    fn step(&mut self, dt: f64) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        let scan = self.world.tick(dt);
        let (v, w) = self.world.robot().current_control();
        self.predicted = self.integrator.step(&self.predicted, v, w, dt);
        self.predicted.z = normalize_angle(self.predicted.z);

        if let Some(scan) = scan {
            if self.measurement_errors.len() < self.config.measurement_samples {
                self.sample_landmarks(&scan)?;
            }
        }

        if self.world.ticks() % self.config.sample_every.max(1) == 0 {
            self.sample_pose();
            self.random_control();
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.pose_errors.len() >= self.config.samples
    }

    fn reset_state(&mut self) {
        self.world.reset();
        self.controls = NoiseSource::new(self.seed);
        self.predicted = self.world.robot().pose();
        self.pose_errors.clear();
        self.measurement_errors.clear();
        self.random_control();
    }
}
