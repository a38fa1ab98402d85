//! Pose and point types for the roadmap.

use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::math::normalize_angle;

/// Absolute 6-DOF pose reported by the odometry boundary.
pub type Pose3D = Isometry3<f64>;

/// A 2D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate in meters
    pub x: f64,
    /// Y coordinate in meters
    pub y: f64,
}

impl Point2D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Robot pose on the map plane.
///
/// Represents position (x, y) in meters and heading (theta) in radians.
/// Theta is normalized to (-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// X position in meters
    pub x: f64,
    /// Y position in meters
    pub y: f64,
    /// Heading in radians, normalized to (-π, π]
    pub theta: f64,
}

impl Pose2D {
    /// Create a new pose with theta normalized to (-π, π].
    #[inline]
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Identity pose at origin with zero heading.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Position component.
    #[inline]
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Euclidean distance between the positions of two poses.
    #[inline]
    pub fn distance(&self, other: &Pose2D) -> f64 {
        self.position().distance(&other.position())
    }

    /// Whether all three components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// How a 6-DOF keyframe pose is flattened onto the map plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanarProjection {
    /// Camera optical frame: x right, y down, z forward.
    ///
    /// Map x is camera z, map y is camera -x, heading is the yaw of the
    /// optical axis about the camera's vertical.
    #[default]
    Camera,
    /// Body frame with z up: map (x, y) is body (x, y), heading is yaw about z.
    Ground,
}

impl PlanarProjection {
    /// Project a 6-DOF pose onto the map plane.
    pub fn project(&self, pose: &Pose3D) -> Pose2D {
        let t = &pose.translation.vector;
        match self {
            PlanarProjection::Camera => {
                let forward = pose.rotation * Vector3::z();
                Pose2D::new(t.z, -t.x, (-forward.x).atan2(forward.z))
            }
            PlanarProjection::Ground => {
                let forward = pose.rotation * Vector3::x();
                Pose2D::new(t.x, t.y, forward.y.atan2(forward.x))
            }
        }
    }
}
