//! Line and landmark extraction from planar range scans
//!
//! A sweep goes through three stages:
//! - partitioning at range discontinuities ([`partition`])
//! - line fitting per partition, by RANSAC ([`ransac`]) or iterative
//!   end-point fit ([`iep`]), or IEP followed by RANSAC
//! - point landmarks at loose partition ends and at line intersections
//!   ([`landmarks`])

pub mod geometry;
pub mod iep;
pub mod landmarks;
pub mod partition;
pub mod ransac;
pub mod scan;

pub use geometry::{perpendicular_distance, LineSegmentFeature};
pub use iep::{iep_breakpoints, iep_partitions, iep_segments};
pub use landmarks::intersection_landmarks;
pub use partition::{loose_end_landmarks, partition_scan, DiscontinuityRule, ScanPartition};
pub use ransac::{least_squares_segment, ransac_lines, RansacConfig};
pub use scan::{LaserGeometry, RawScan};

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlamError};
use crate::util::Point;

/// Line fitting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractorKind {
    /// RANSAC on each discontinuity partition
    Ransac { least_squares: bool },
    /// Iterative end-point fit on each discontinuity partition
    Iep,
    /// IEP splits each partition, RANSAC fits each piece, IEP split points become landmarks
    IepRansac { least_squares: bool },
}

impl Default for ExtractorKind {
    fn default() -> Self {
        ExtractorKind::IepRansac {
            least_squares: true,
        }
    }
}

impl ExtractorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractorKind::Ransac {
                least_squares: false,
            } => "RANSAC",
            ExtractorKind::Ransac {
                least_squares: true,
            } => "RANSAC/LS",
            ExtractorKind::Iep => "IEP",
            ExtractorKind::IepRansac {
                least_squares: false,
            } => "IEP/RANSAC",
            ExtractorKind::IepRansac {
                least_squares: true,
            } => "IEP/RANSAC/LS",
        }
    }
}

/// Extraction tuning. Distances are in scene units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub kind: ExtractorKind,
    /// Range jump between valid neighbours that splits a partition
    pub discontinuity_threshold: f64,
    /// Range jump into or out of "no return" that splits a partition
    pub lower_landmark_margin: f64,
    pub ransac: RansacConfig,
    /// Split tolerance for [`ExtractorKind::Iep`]
    pub iep_epsilon: f64,
    /// Split tolerance for the IEP stage of [`ExtractorKind::IepRansac`]
    pub iep_refine_epsilon: f64,
    /// Max distance between a line intersection and the scan point it snaps to
    pub intersection_margin: f64,
    /// Cross product of unit directions below which two lines count as parallel
    pub parallel_epsilon: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            kind: ExtractorKind::default(),
            discontinuity_threshold: 60.0,
            lower_landmark_margin: 1.0,
            ransac: RansacConfig::default(),
            iep_epsilon: 10.0,
            iep_refine_epsilon: 15.0,
            intersection_margin: 30.0,
            parallel_epsilon: 1e-6,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("discontinuity_threshold", self.discontinuity_threshold),
            ("lower_landmark_margin", self.lower_landmark_margin),
            ("ransac.inlier_threshold", self.ransac.inlier_threshold),
            ("iep_epsilon", self.iep_epsilon),
            ("iep_refine_epsilon", self.iep_refine_epsilon),
            ("intersection_margin", self.intersection_margin),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(SlamError::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        if self.ransac.iterations == 0 {
            return Err(SlamError::InvalidConfig("ransac.iterations must be non-zero".into()));
        }
        if self.ransac.min_inliers < 2 {
            return Err(SlamError::InvalidConfig("ransac.min_inliers must be at least 2".into()));
        }
        Ok(())
    }
}

/// Lines and landmarks found in one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub lines: Vec<LineSegmentFeature>,
    pub landmarks: Vec<Point>,
    /// Number of discontinuity partitions
    pub partitions: usize,
}

/// Turns a projected sweep into line segments and point landmarks.
#[derive(Debug, Clone)]
pub struct LineFeatureExtractor {
    config: ExtractionConfig,
    geometry: LaserGeometry,
}

impl LineFeatureExtractor {
    pub fn new(config: ExtractionConfig, geometry: LaserGeometry) -> Self {
        Self { config, geometry }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn geometry(&self) -> &LaserGeometry {
        &self.geometry
    }

    fn rng(&self) -> StdRng {
        match self.config.ransac.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Extract lines and landmarks.
    ///
    /// `points` are the projections of the valid entries of `distances`, in
    /// beam order; `distances` is the whole sweep including invalid beams.
    pub fn extract(&self, points: &[Point], distances: &[f64]) -> Result<Extraction> {
        let valid = distances.iter().filter(|&&d| self.geometry.is_valid(d)).count();
        if valid != points.len() {
            return Err(SlamError::ScanMismatch {
                valid,
                points: points.len(),
            });
        }

        let cfg = &self.config;
        let rule = DiscontinuityRule {
            discontinuity_threshold: cfg.discontinuity_threshold,
            lower_landmark_margin: cfg.lower_landmark_margin,
        };
        let partitions = partition_scan(distances, &self.geometry, &rule);
        let mut landmarks = loose_end_landmarks(
            &partitions,
            points,
            distances,
            &self.geometry,
            cfg.ransac.min_inliers,
            cfg.discontinuity_threshold,
        );

        let mut rng = self.rng();
        let mut lines = Vec::new();
        for partition in &partitions {
            let run = &points[partition.points.clone()];
            match cfg.kind {
                ExtractorKind::Ransac { least_squares } => {
                    lines.extend(ransac_lines(run, &cfg.ransac, least_squares, &mut rng));
                }
                ExtractorKind::Iep => lines.extend(iep_segments(run, cfg.iep_epsilon)),
                ExtractorKind::IepRansac { least_squares } => {
                    let pieces = iep_partitions(run, cfg.iep_refine_epsilon);
                    for (k, piece) in pieces.iter().enumerate() {
                        if k > 0 && piece.len() >= cfg.ransac.min_inliers {
                            landmarks.push(run[piece.start - 1]);
                        }
                        lines.extend(ransac_lines(
                            &run[piece.clone()],
                            &cfg.ransac,
                            least_squares,
                            &mut rng,
                        ));
                    }
                }
            }
        }

        landmarks.extend(intersection_landmarks(
            &lines,
            points,
            cfg.intersection_margin,
            cfg.parallel_epsilon,
        ));

        debug!(
            "{}: {} partitions, {} lines, {} landmarks",
            cfg.kind.label(),
            partitions.len(),
            lines.len(),
            landmarks.len()
        );

        Ok(Extraction {
            lines,
            landmarks,
            partitions: partitions.len(),
        })
    }
}
