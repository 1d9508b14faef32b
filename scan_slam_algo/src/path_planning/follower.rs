//! Waypoint follower producing unicycle commands.

use serde::{Deserialize, Serialize};

use crate::util::{normalize_angle, Point, Pose};

/// Phase of the follower for the current waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowState {
    /// Turning in place toward the waypoint
    #[default]
    Rotate,
    /// Driving straight at cruise speed
    Drive,
    /// Final waypoint reached
    Arrived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    /// Heading error (rad) below which the follower drives
    pub orientation_slack: f64,
    /// Distance at which a waypoint counts as reached
    pub milestone_slack: f64,
    pub cruise_speed: f64,
    /// Proportional gain on heading error while rotating
    pub angular_gain: f64,
    pub max_angular_speed: f64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            orientation_slack: 0.1,
            milestone_slack: 10.0,
            cruise_speed: 50.0,
            angular_gain: 1.0,
            max_angular_speed: 0.5,
        }
    }
}

/// Rotate-then-drive follower over a waypoint list.
#[derive(Debug, Clone, Default)]
pub struct PathFollower {
    config: FollowerConfig,
    path: Vec<Point>,
    index: usize,
    state: FollowState,
}

impl PathFollower {
    pub fn new(config: FollowerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Replace the path and restart from its first waypoint
    pub fn set_path(&mut self, path: Vec<Point>) {
        self.path = path;
        self.index = 0;
        self.state = FollowState::Rotate;
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn waypoint_index(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.state == FollowState::Arrived
    }

    /// Command `(v, w)` for the given pose.
    ///
    /// Waypoints within `milestone_slack` are consumed in the same call, so a
    /// dense cell path does not stop the robot at every cell.
    pub fn command(&mut self, pose: &Pose) -> (f64, f64) {
        let position = Point::new(pose.x, pose.y);
        loop {
            let Some(target) = self.path.get(self.index).copied() else {
                self.state = FollowState::Arrived;
                return (0.0, 0.0);
            };
            let offset = target - position;
            if offset.norm() <= self.config.milestone_slack {
                if self.index + 1 >= self.path.len() {
                    self.state = FollowState::Arrived;
                    return (0.0, 0.0);
                }
                self.index += 1;
                self.state = FollowState::Rotate;
                continue;
            }

            let error = normalize_angle(offset.y.atan2(offset.x) - pose.z);
            self.state = if error.abs() <= self.config.orientation_slack {
                FollowState::Drive
            } else {
                FollowState::Rotate
            };
            return match self.state {
                FollowState::Drive => (self.config.cruise_speed, 0.0),
                _ => {
                    let max = self.config.max_angular_speed;
                    (0.0, (self.config.angular_gain * error).clamp(-max, max))
                }
            };
        }
    }
}
