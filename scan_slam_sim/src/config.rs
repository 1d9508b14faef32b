//! Simulator configuration: the SLAM pipeline plus the truth side.

use std::path::Path;

use scan_slam_algo::config::SlamConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::laser::LaserNoiseConfig;
use crate::robot::RobotConfig;
use crate::simulator::{CalibrationConfig, SessionConfig, WorldConfig};

/// Full simulator configuration loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Extractor, estimator, grid and follower
    #[serde(default)]
    pub slam: SlamConfig,

    #[serde(default)]
    pub robot: RobotConfig,

    #[serde(default)]
    pub laser_noise: LaserNoiseConfig,

    #[serde(default)]
    pub world: WorldConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Random-drive noise estimation
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl SimConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.slam.validate()?;
        if !(config.world.dt > 0.0 && config.world.scene_scale > 0.0) {
            return Err(SimError::InvalidConfig(
                "world.dt and world.scene_scale must be positive".into(),
            ));
        }
        let [v_lo, v_hi] = config.calibration.speed_range;
        let [w_lo, w_hi] = config.calibration.turn_rate_range;
        if v_lo > v_hi || w_lo > w_hi {
            return Err(SimError::InvalidConfig(
                "calibration ranges must be [low, high]".into(),
            ));
        }
        Ok(config)
    }

    /// Fix every random seed that is still unset
    pub fn seed_all(&mut self, seed: u64) {
        self.world.seed.get_or_insert(seed);
        self.slam.extraction.ransac.seed.get_or_insert(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_slam_algo::SlamError;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.robot.max_linear_acceleration, 20.0);
        assert_eq!(config.world.scan_every, 10);
        assert_eq!(config.laser_noise.distance_error, 5.0);
        assert_eq!(config.slam.laser.count, 181);
    }

    #[test]
    fn test_nested_yaml() {
        let yaml = r#"
slam:
  ekf:
    clean_threshold: 5
world:
  seed: 11
session:
  goal: [150.0, -40.0]
"#;
        let config = SimConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.slam.ekf.clean_threshold, 5);
        assert_eq!(config.world.seed, Some(11));
        assert_eq!(config.session.goal, Some([150.0, -40.0]));
        assert_eq!(config.robot, RobotConfig::default());
    }

    #[test]
    fn test_invalid_slam_section_is_rejected() {
        let err = SimConfig::from_yaml("slam:\n  extraction:\n    iep_epsilon: -1\n").unwrap_err();
        assert!(matches!(err, SimError::Slam(SlamError::InvalidConfig(_))));
        assert!(matches!(
            SimConfig::from_yaml("world:\n  dt: 0\n"),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_yaml("calibration:\n  speed_range: [150.0, 50.0]\n"),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_and_io_errors_keep_their_source() {
        use std::error::Error;

        let err = SimConfig::from_yaml("robot: [1, 2]").unwrap_err();
        assert!(matches!(err, SimError::ConfigParse(_)));
        assert!(err.source().is_some());

        let err = SimConfig::load(Path::new("/nonexistent/sim.yaml")).unwrap_err();
        assert!(matches!(err, SimError::ConfigIo { .. }));
        assert!(err.to_string().contains("/nonexistent/sim.yaml"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_seed_all_keeps_explicit_seeds() {
        let mut config = SimConfig::default();
        config.world.seed = Some(1);
        config.seed_all(9);
        assert_eq!(config.world.seed, Some(1));
        assert_eq!(config.slam.extraction.ransac.seed, Some(9));
    }
}
