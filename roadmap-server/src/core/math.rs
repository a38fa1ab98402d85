//! Mathematical primitives for planar roadmap operations.
//!
//! Functions for angle normalization and angular arithmetic.

use std::f64::consts::{PI, TAU};

/// Normalize angle to (-π, π].
///
/// `-π` maps to `π` so every heading has exactly one representation.
///
/// # Example
/// ```
/// use roadmap_server::core::math::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
/// assert!((normalize_angle(-PI) - PI).abs() < 1e-9);
/// ```
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Shortest angular difference from angle `a` to angle `b`.
///
/// Returns the signed angle you need to add to `a` to reach `b`,
/// taking the shortest path around the circle.
///
/// # Example
/// ```
/// use roadmap_server::core::math::angle_diff;
/// use std::f64::consts::PI;
///
/// // Crossing the ±π boundary takes the short way
/// let diff = angle_diff(PI - 0.1, -PI + 0.1);
/// assert!((diff - 0.2).abs() < 1e-9);
/// ```
#[inline]
pub fn angle_diff(a: f64, b: f64) -> f64 {
    normalize_angle(b - a)
}

/// Yaw (rotation about +z) of a unit quaternion given as `(x, y, z, w)`.
///
/// Uses the ZYX Euler convention, matching the usual
/// `euler_from_quaternion(...)[2]` of robotics toolkits.
#[inline]
pub fn yaw_from_quaternion(x: f64, y: f64, z: f64, w: f64) -> f64 {
    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    normalize_angle(siny_cosp.atan2(cosy_cosp))
}
