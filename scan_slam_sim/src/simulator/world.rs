//! Ground truth: the scene, the robot moving through it and its laser.

use log::warn;
use scan_slam_algo::extraction::{LaserGeometry, RawScan};
use serde::{Deserialize, Serialize};

use super::common::NoiseSource;
use crate::laser::{LaserNoiseConfig, LaserSensor};
use crate::robot::{RobotConfig, TruthRobot};
use crate::scene::{Scene, DEFAULT_SCENE_SCALE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Tick length in seconds
    pub dt: f64,
    /// A sweep is taken every this many ticks
    pub scan_every: u64,
    /// Scene unit to world unit factor
    pub scene_scale: f64,
    /// Seed for the truth noise (None = from entropy)
    pub seed: Option<u64>,
    /// Walls do not stop the robot
    pub ghost: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            scan_every: 10,
            scene_scale: DEFAULT_SCENE_SCALE,
            seed: None,
            ghost: false,
        }
    }
}

/// Scene, robot and sensor advanced one tick at a time.
#[derive(Debug, Clone)]
pub struct World {
    scene: Scene,
    robot_config: RobotConfig,
    robot: TruthRobot,
    laser: LaserSensor,
    noise: NoiseSource,
    scan_every: u64,
    seed: Option<u64>,
    ghost: bool,
    ticks: u64,
    crashed: bool,
}

impl World {
    pub fn new(
        scene: Scene,
        robot_config: RobotConfig,
        geometry: LaserGeometry,
        laser_noise: LaserNoiseConfig,
        config: &WorldConfig,
    ) -> Self {
        let robot = TruthRobot::new(robot_config.clone(), scene.initial_pose, scene.robot_length);
        Self {
            scene,
            robot_config,
            robot,
            laser: LaserSensor::new(geometry, laser_noise),
            noise: NoiseSource::new(config.seed),
            scan_every: config.scan_every.max(1),
            seed: config.seed,
            ghost: config.ghost,
            ticks: 0,
            crashed: false,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn robot(&self) -> &TruthRobot {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut TruthRobot {
        &mut self.robot
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn crashed(&self) -> bool {
        self.crashed
    }

    /// Move the robot by `dt`, check for a crash and sweep on scan ticks.
    ///
    /// Returns the new sweep, if one was taken. Its timestamp is the tick number.
    pub fn tick(&mut self, dt: f64) -> Option<RawScan> {
        self.robot.update_pose(dt, &mut self.noise);
        if !self.ghost
            && !self.crashed
            && self.scene.clearance(&self.robot.position()) < self.robot.length()
        {
            let pose = self.robot.pose();
            warn!(
                "robot crashed at ({:.1}, {:.1}) on tick {}",
                pose.x, pose.y, self.ticks
            );
            self.robot.stop();
            self.crashed = true;
        }

        let scan = (self.ticks % self.scan_every == 0).then(|| {
            let pose = self.robot.pose();
            self.laser.scan(
                &self.scene,
                &self.robot.laser_origin(),
                pose.z,
                self.ticks,
                &mut self.noise,
            )
        });
        self.ticks += 1;
        scan
    }

    /// Put the robot back at its initial pose and restart the noise sequence.
    pub fn reset(&mut self) {
        self.robot = TruthRobot::new(
            self.robot_config.clone(),
            self.scene.initial_pose,
            self.scene.robot_length,
        );
        self.noise = NoiseSource::new(self.seed);
        self.ticks = 0;
        self.crashed = false;
    }
}
