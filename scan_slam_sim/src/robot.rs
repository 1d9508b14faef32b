//! Ground-truth unicycle robot with acceleration limits and velocity noise.

use scan_slam_algo::slam::rk4_step;
use scan_slam_algo::util::{normalize_angle, Point, Pose};
use serde::{Deserialize, Serialize};

use crate::simulator::common::NoiseSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Units/s²
    pub max_linear_acceleration: f64,
    /// rad/s²
    pub max_angular_acceleration: f64,
    /// Relative bound of the multiplicative forward-speed noise
    pub linear_velocity_error: f64,
    /// Relative bound of the multiplicative turn-rate noise
    pub angular_velocity_error: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            max_linear_acceleration: 20.0,
            max_angular_acceleration: 0.5,
            linear_velocity_error: 0.5,
            angular_velocity_error: 0.1,
        }
    }
}

/// Commanded speeds `(v, w)`
pub type Control = (f64, f64);

/// The simulated robot. Its pose is never visible to the estimator.
#[derive(Debug, Clone)]
pub struct TruthRobot {
    config: RobotConfig,
    pose: Pose,
    length: f64,
    goal_control: Control,
    current_control: Control,
    running: bool,
}

impl TruthRobot {
    pub fn new(config: RobotConfig, pose: Pose, length: f64) -> Self {
        Self {
            config,
            pose,
            length,
            goal_control: (0.0, 0.0),
            current_control: (0.0, 0.0),
            running: true,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Point {
        Point::new(self.pose.x, self.pose.y)
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn radius(&self) -> f64 {
        0.5 * self.length
    }

    /// Noise-free control the robot is currently executing
    pub fn current_control(&self) -> Control {
        self.current_control
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Set the control the robot accelerates toward
    pub fn apply_control(&mut self, control: Control) {
        self.goal_control = control;
    }

    /// Halt the robot for good
    pub fn stop(&mut self) {
        self.running = false;
        self.goal_control = (0.0, 0.0);
        self.current_control = (0.0, 0.0);
    }

    /// Laser mount: the tail of the robot, half a length behind the centre
    pub fn laser_origin(&self) -> Point {
        laser_origin(&self.pose, self.radius())
    }

    /// Advance the true pose by `dt`.
    ///
    /// The executed control moves toward the goal within the acceleration
    /// limits; noise is applied only while the robot is trying to move.
    pub fn update_pose(&mut self, dt: f64, noise: &mut NoiseSource) {
        if !self.running {
            return;
        }
        let max_dv = self.config.max_linear_acceleration * dt;
        let max_dw = self.config.max_angular_acceleration * dt;
        let (v, w) = self.current_control;
        let v = v + (self.goal_control.0 - v).clamp(-max_dv, max_dv);
        let w = w + (self.goal_control.1 - w).clamp(-max_dw, max_dw);
        self.current_control = (v, w);

        let (mut v_noisy, mut w_noisy) = (v, w);
        if v != 0.0 || w != 0.0 {
            v_noisy = noise.scale(v, self.config.linear_velocity_error);
            w_noisy = noise.scale(w, self.config.angular_velocity_error);
        }
        self.pose = rk4_step(&self.pose, v_noisy, w_noisy, dt);
        self.pose.z = normalize_angle(self.pose.z);
    }
}

/// Tail of a robot of the given radius at `pose`
pub fn laser_origin(pose: &Pose, radius: f64) -> Point {
    Point::new(pose.x, pose.y) - Point::new(pose.z.cos(), pose.z.sin()) * radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quiet_config() -> RobotConfig {
        RobotConfig {
            linear_velocity_error: 0.0,
            angular_velocity_error: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_acceleration_is_limited() {
        let mut noise = NoiseSource::new(Some(1));
        let mut robot = TruthRobot::new(quiet_config(), Pose::zeros(), 10.0);
        robot.apply_control((4.0, 0.15));
        robot.update_pose(0.01, &mut noise);
        let (v, w) = robot.current_control();
        assert_relative_eq!(v, 0.2, epsilon = 1e-12);
        assert_relative_eq!(w, 0.005, epsilon = 1e-12);

        for _ in 0..100 {
            robot.update_pose(0.01, &mut noise);
        }
        let (v, w) = robot.current_control();
        assert_relative_eq!(v, 4.0, epsilon = 1e-12);
        assert_relative_eq!(w, 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_straight_drive_without_noise() {
        let mut noise = NoiseSource::new(Some(1));
        let mut robot = TruthRobot::new(quiet_config(), Pose::new(0.0, 5.0, 0.0), 10.0);
        robot.apply_control((2.0, 0.0));
        for _ in 0..100 {
            robot.update_pose(0.01, &mut noise);
        }
        // Speed ramps to 2 in 0.1 s: 0.2*(1+..+10)*0.01 + 2*0.9
        let expected = 0.2 * 55.0 * 0.01 + 2.0 * 0.9;
        assert_relative_eq!(robot.pose(), Pose::new(expected, 5.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_idle_robot_has_no_noise() {
        let mut noise = NoiseSource::new(None);
        let mut robot = TruthRobot::new(RobotConfig::default(), Pose::new(1.0, 2.0, 0.3), 10.0);
        robot.update_pose(0.01, &mut noise);
        assert_eq!(robot.pose(), Pose::new(1.0, 2.0, 0.3));
    }

    #[test]
    fn test_stopped_robot_stays_put() {
        let mut noise = NoiseSource::new(Some(2));
        let mut robot = TruthRobot::new(RobotConfig::default(), Pose::zeros(), 10.0);
        robot.apply_control((5.0, 0.0));
        robot.stop();
        robot.update_pose(0.01, &mut noise);
        assert!(!robot.is_running());
        assert_eq!(robot.pose(), Pose::zeros());
        assert_eq!(robot.current_control(), (0.0, 0.0));
    }

    #[test]
    fn test_laser_sits_at_the_tail() {
        let robot = TruthRobot::new(RobotConfig::default(), Pose::new(10.0, 0.0, std::f64::consts::FRAC_PI_2), 8.0);
        assert_relative_eq!(robot.laser_origin(), Point::new(10.0, -4.0), epsilon = 1e-12);
    }
}
