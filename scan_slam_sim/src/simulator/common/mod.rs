//! Utilities shared by the simulations.
//!
//! - [`TrajectoryHistory`]: true / estimated / dead-reckoned trajectories
//! - [`ErrorTracker`]: estimation error against the truth
//! - [`NoiseSource`]: seedable uniform noise

pub mod error_tracking;
pub mod history;
pub mod noise;

pub use error_tracking::ErrorTracker;
pub use history::{TrackSample, TrajectoryHistory, DEFAULT_HISTORY_LEN};
pub use noise::NoiseSource;
