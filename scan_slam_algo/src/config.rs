//! Top-level configuration for the SLAM pipeline, loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlamError};
use crate::extraction::{ExtractionConfig, LaserGeometry};
use crate::path_planning::{FollowerConfig, GridConfig};
use crate::slam::EkfSlamConfig;

/// Every tunable of the extractor, estimator, planner and follower.
///
/// Missing sections fall back to their defaults, so an empty document is a
/// valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlamConfig {
    #[serde(default)]
    pub laser: LaserGeometry,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub ekf: EkfSlamConfig,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub follower: FollowerConfig,
}

impl SlamConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SlamError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.laser.count < 2 || !(self.laser.max_theta > self.laser.min_theta) {
            return Err(SlamError::InvalidConfig(
                "laser needs at least two beams over a non-empty angular range".into(),
            ));
        }
        if !(self.laser.max_distance > 0.0) {
            return Err(SlamError::InvalidConfig("laser.max_distance must be positive".into()));
        }
        self.extraction.validate()?;
        self.ekf.validate()?;

        let g = &self.grid;
        if g.num_cells[0] == 0 || g.num_cells[1] == 0 {
            return Err(SlamError::InvalidConfig("grid.num_cells must be non-zero".into()));
        }
        if !(g.max_corner[0] > g.min_corner[0] && g.max_corner[1] > g.min_corner[1]) {
            return Err(SlamError::InvalidConfig("grid.max_corner must exceed grid.min_corner".into()));
        }

        let f = &self.follower;
        if !(f.orientation_slack > 0.0 && f.milestone_slack > 0.0 && f.max_angular_speed > 0.0) {
            return Err(SlamError::InvalidConfig(
                "follower slacks and max_angular_speed must be positive".into(),
            ));
        }
        Ok(())
    }
}
