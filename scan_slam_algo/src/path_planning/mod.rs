//! Path planning over scan hits
//!
//! - [`grid`]: hit-count occupancy grid with agent-radius inflation
//! - [`astar`]: 8-connected A* over free cells
//! - [`replan`]: re-planning when the current path gets obstructed
//! - [`follower`]: rotate-then-drive waypoint follower

pub mod astar;
pub mod follower;
pub mod grid;
pub mod replan;

pub use astar::{AStarPlanner, AStarResult};
pub use follower::{FollowState, FollowerConfig, PathFollower};
pub use grid::{Cell, GridConfig, HitGrid};
pub use replan::ReactivePlanner;
