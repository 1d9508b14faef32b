//! Simultaneous localization and mapping
//!
//! - [`ekf_slam`]: EKF-SLAM over point landmarks with augmentation and pruning
//! - [`motion`]: unicycle motion model and its Jacobians

pub mod ekf_slam;
pub mod motion;

pub use ekf_slam::*;
pub use motion::*;
