//! Error types for the simulator.

use std::path::PathBuf;

use scan_slam_algo::SlamError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("failed to read scene {}: {source}", .path.display())]
    SceneIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed scene line (1-based line number)
    #[error("scene line {line}: {message}")]
    SceneParse { line: usize, message: String },

    #[error("scene has no walls")]
    EmptyScene,

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A value that parses but cannot be simulated
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write log: {0}")]
    LogIo(#[from] std::io::Error),

    #[error(transparent)]
    Slam(#[from] SlamError),
}

pub type Result<T> = std::result::Result<T, SimError>;
