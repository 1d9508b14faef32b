//! Error types for the SLAM pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the estimator, the extractor, the planner and config loading.
#[derive(Error, Debug)]
pub enum SlamError {
    /// State vector length does not match the landmark bookkeeping.
    #[error("state vector has {state_len} rows but {landmarks} landmarks are tracked")]
    StateSizeMismatch { state_len: usize, landmarks: usize },

    /// Covariance shape does not match the state vector.
    #[error("covariance is {rows}x{cols} but the state vector has {state_len} rows")]
    CovarianceShape {
        rows: usize,
        cols: usize,
        state_len: usize,
    },

    /// The point list and the raw distance array disagree.
    #[error("scan has {valid} valid returns but {points} points were supplied")]
    ScanMismatch { valid: usize, points: usize },

    /// World coordinate outside the occupancy grid.
    #[error("point ({x:.2}, {y:.2}) lies outside the grid")]
    OutsideGrid { x: f64, y: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SlamError>;
