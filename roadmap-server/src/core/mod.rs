//! Foundation layer: geometry types and math.
//!
//! No internal dependencies.

pub mod math;
pub mod types;

pub use types::{PlanarProjection, Point2D, Pose2D, Pose3D};
