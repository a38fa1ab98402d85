//! Core data types for the roadmap.

mod pose;

pub use pose::{PlanarProjection, Point2D, Pose2D, Pose3D};
