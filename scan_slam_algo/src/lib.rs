#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]

pub mod config;
pub mod error;
pub mod extraction;
pub mod path_planning;
pub mod slam;
pub mod util;
pub mod prelude {
    pub use crate::util::*;
    pub use crate::*;
    pub use crate::config::SlamConfig;
    pub use crate::error::{Result, SlamError};
    pub use crate::extraction::{
        ExtractionConfig, Extraction, ExtractorKind, LaserGeometry, LineFeatureExtractor,
        LineSegmentFeature, RawScan,
    };
    pub use crate::path_planning::{
        AStarPlanner, AStarResult, FollowState, FollowerConfig, GridConfig, HitGrid, PathFollower,
        ReactivePlanner,
    };
    pub use crate::slam::{
        augment_update, propagate, prune, AugmentReport, EkfSlamConfig, EkfSlamState,
        LandmarkEstimate, MotionIntegrator, RelativeMeasurement,
    };
    pub use nalgebra;
    pub use nalgebra::{matrix, vector};
}

pub use prelude::*;
