#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod laser;
pub mod robot;
pub mod scene;
pub mod simulator;

pub mod prelude {
    pub use crate::config::SimConfig;
    pub use crate::error::{Result, SimError};
    pub use crate::laser::{LaserNoiseConfig, LaserSensor};
    pub use crate::robot::{RobotConfig, TruthRobot};
    pub use crate::scene::{Scene, Wall};
    pub use crate::simulator::{
        CalibrationConfig, CalibrationReport, Calibrator, NoiseEstimate, SessionConfig,
        SessionSummary, Simulate, Simulator, SlamSession, StepLog, World, WorldConfig,
    };
}

pub use prelude::*;
