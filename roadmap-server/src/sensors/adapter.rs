//! Frame/Pose adapter: validates raw source payloads.
//!
//! Converts [`SensorMessage`]s into either a [`Frame`] (stereo pair plus
//! calibration) or a [`PoseSample`] (planar pose). Malformed input is
//! dropped, never retried, and never reaches the skeleton. Every drop is
//! counted in [`AdapterStats`], which can be shared with a logging thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::types::{CameraInfo, LocalizedPose, MonoImage, SensorMessage, StereoPair, StereoSide};
use crate::core::math::yaw_from_quaternion;
use crate::core::types::Pose2D;

/// Rectified stereo camera model shared by both images of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoCamera {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    /// Principal point x of the left camera.
    pub cx_left: f64,
    /// Principal point x of the right camera.
    pub cx_right: f64,
    pub cy: f64,
    /// Baseline in meters.
    pub baseline: f64,
}

/// Validated stereo frame, ready for the odometry boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp_us: u64,
    pub camera: StereoCamera,
    pub left: MonoImage,
    pub right: MonoImage,
}

/// Validated planar pose sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub timestamp_us: u64,
    pub pose: Pose2D,
}

impl PoseSample {
    /// Create a sample with heading normalized to (-π, π].
    pub fn new(x: f64, y: f64, theta: f64, timestamp_us: u64) -> Self {
        Self {
            timestamp_us,
            pose: Pose2D::new(x, y, theta),
        }
    }
}

/// Output of a successful adaptation.
#[derive(Debug, Clone, PartialEq)]
pub enum AdaptedInput {
    Frame(Frame),
    Sample(PoseSample),
}

/// Why a payload was dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputRejected {
    #[error("{side} calibration is {calib_width}x{calib_height} but image is {image_width}x{image_height}")]
    CalibrationMismatch {
        side: StereoSide,
        calib_width: u32,
        calib_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("stereo images differ in size: left {left_width}x{left_height}, right {right_width}x{right_height}")]
    PairSizeMismatch {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },

    #[error("{side} image buffer holds {actual} bytes, expected {expected}")]
    BufferSize {
        side: StereoSide,
        expected: usize,
        actual: usize,
    },

    #[error("invalid {side} calibration: {reason}")]
    InvalidCalibration {
        side: StereoSide,
        reason: &'static str,
    },

    #[error("pose sample has non-finite {0}")]
    NonFinite(&'static str),

    #[error("pose orientation quaternion has zero norm")]
    DegenerateOrientation,
}

/// Snapshot of the adapter counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterCounts {
    pub frames_accepted: u64,
    pub frames_dropped: u64,
    pub samples_accepted: u64,
    pub samples_dropped: u64,
}

impl AdapterCounts {
    /// Total number of dropped payloads.
    pub fn dropped(&self) -> u64 {
        self.frames_dropped + self.samples_dropped
    }
}

/// Lock-free counters readable from other threads.
#[derive(Debug, Default)]
pub struct AdapterStats {
    frames_accepted: AtomicU64,
    frames_dropped: AtomicU64,
    samples_accepted: AtomicU64,
    samples_dropped: AtomicU64,
}

impl AdapterStats {
    /// Read all counters.
    pub fn counts(&self) -> AdapterCounts {
        AdapterCounts {
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Validating adapter from source payloads to frames and pose samples.
#[derive(Debug, Default)]
pub struct FrameAdapter {
    stats: Arc<AdapterStats>,
}

impl FrameAdapter {
    /// Create an adapter with fresh counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the drop/accept counters.
    pub fn stats(&self) -> Arc<AdapterStats> {
        Arc::clone(&self.stats)
    }

    /// Validate a message. Returns `None` (and counts the drop) if malformed.
    pub fn adapt(&self, message: SensorMessage) -> Option<AdaptedInput> {
        match message {
            SensorMessage::Stereo(pair) => match Self::frame_from_stereo(pair) {
                Ok(frame) => {
                    self.stats.frames_accepted.fetch_add(1, Ordering::Relaxed);
                    Some(AdaptedInput::Frame(frame))
                }
                Err(reason) => {
                    self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Dropped stereo frame: {}", reason);
                    None
                }
            },
            SensorMessage::Pose(pose) => match Self::sample_from_pose(&pose) {
                Ok(sample) => {
                    self.stats.samples_accepted.fetch_add(1, Ordering::Relaxed);
                    Some(AdaptedInput::Sample(sample))
                }
                Err(reason) => {
                    self.stats.samples_dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Dropped pose sample: {}", reason);
                    None
                }
            },
        }
    }

    /// Build a frame from a stereo pair, checking calibration against images.
    pub fn frame_from_stereo(pair: StereoPair) -> Result<Frame, InputRejected> {
        check_image(StereoSide::Left, &pair.left_info, &pair.left)?;
        check_image(StereoSide::Right, &pair.right_info, &pair.right)?;

        if pair.left.width != pair.right.width || pair.left.height != pair.right.height {
            return Err(InputRejected::PairSizeMismatch {
                left_width: pair.left.width,
                left_height: pair.left.height,
                right_width: pair.right.width,
                right_height: pair.right.height,
            });
        }

        check_intrinsics(StereoSide::Left, &pair.left_info)?;
        check_intrinsics(StereoSide::Right, &pair.right_info)?;
        if !(pair.right_info.baseline.is_finite() && pair.right_info.baseline > 0.0) {
            return Err(InputRejected::InvalidCalibration {
                side: StereoSide::Right,
                reason: "baseline must be positive",
            });
        }

        let camera = StereoCamera {
            width: pair.left.width,
            height: pair.left.height,
            fx: pair.left_info.fx,
            fy: pair.left_info.fy,
            cx_left: pair.left_info.cx,
            cx_right: pair.right_info.cx,
            cy: pair.left_info.cy,
            baseline: pair.right_info.baseline,
        };

        Ok(Frame {
            timestamp_us: pair.timestamp_us,
            camera,
            left: pair.left,
            right: pair.right,
        })
    }

    /// Flatten a localized pose to (x, y, yaw).
    pub fn sample_from_pose(pose: &LocalizedPose) -> Result<PoseSample, InputRejected> {
        let [x, y, z] = pose.position;
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(InputRejected::NonFinite("position"));
        }

        let [qx, qy, qz, qw] = pose.orientation;
        if !pose.orientation.iter().all(|v| v.is_finite()) {
            return Err(InputRejected::NonFinite("orientation"));
        }
        let norm = (qx * qx + qy * qy + qz * qz + qw * qw).sqrt();
        if norm < 1e-9 {
            return Err(InputRejected::DegenerateOrientation);
        }

        let theta = yaw_from_quaternion(qx / norm, qy / norm, qz / norm, qw / norm);
        Ok(PoseSample::new(x, y, theta, pose.timestamp_us))
    }
}

fn check_image(side: StereoSide, info: &CameraInfo, image: &MonoImage) -> Result<(), InputRejected> {
    if info.width != image.width || info.height != image.height {
        return Err(InputRejected::CalibrationMismatch {
            side,
            calib_width: info.width,
            calib_height: info.height,
            image_width: image.width,
            image_height: image.height,
        });
    }
    if image.data.len() != image.expected_len() {
        return Err(InputRejected::BufferSize {
            side,
            expected: image.expected_len(),
            actual: image.data.len(),
        });
    }
    Ok(())
}

fn check_intrinsics(side: StereoSide, info: &CameraInfo) -> Result<(), InputRejected> {
    let values = [info.fx, info.fy, info.cx, info.cy];
    if !values.iter().all(|v| v.is_finite()) {
        return Err(InputRejected::InvalidCalibration {
            side,
            reason: "non-finite intrinsics",
        });
    }
    if info.fx <= 0.0 || info.fy <= 0.0 {
        return Err(InputRejected::InvalidCalibration {
            side,
            reason: "focal length must be positive",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn info(width: u32, height: u32, baseline: f64) -> CameraInfo {
        CameraInfo {
            width,
            height,
            fx: 389.0,
            fy: 389.0,
            cx: 323.42,
            cy: 274.95,
            baseline,
        }
    }

    fn image(width: u32, height: u32) -> MonoImage {
        MonoImage {
            width,
            height,
            data: vec![0; (width * height) as usize],
        }
    }

    fn pair(width: u32, height: u32) -> StereoPair {
        StereoPair {
            timestamp_us: 42,
            left_info: info(width, height, 0.0),
            right_info: info(width, height, 0.089),
            left: image(width, height),
            right: image(width, height),
        }
    }

    fn pose(position: [f64; 3], orientation: [f64; 4]) -> LocalizedPose {
        LocalizedPose {
            timestamp_us: 7,
            position,
            orientation,
        }
    }

    #[test]
    fn test_valid_pair_becomes_frame() {
        let frame = FrameAdapter::frame_from_stereo(pair(8, 6)).unwrap();
        assert_eq!(frame.timestamp_us, 42);
        assert_eq!(frame.camera.width, 8);
        assert_relative_eq!(frame.camera.baseline, 0.089);
    }

    #[test]
    fn test_calibration_mismatch_rejected() {
        let mut p = pair(8, 6);
        p.right_info.width = 640;
        let err = FrameAdapter::frame_from_stereo(p).unwrap_err();
        assert!(matches!(
            err,
            InputRejected::CalibrationMismatch {
                side: StereoSide::Right,
                calib_width: 640,
                ..
            }
        ));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut p = pair(8, 6);
        p.left.data.truncate(10);
        let err = FrameAdapter::frame_from_stereo(p).unwrap_err();
        assert_eq!(
            err,
            InputRejected::BufferSize {
                side: StereoSide::Left,
                expected: 48,
                actual: 10
            }
        );
    }

    #[test]
    fn test_pair_size_mismatch_rejected() {
        let mut p = pair(8, 6);
        p.right = image(4, 6);
        p.right_info.width = 4;
        let err = FrameAdapter::frame_from_stereo(p).unwrap_err();
        assert!(matches!(err, InputRejected::PairSizeMismatch { .. }));
    }

    #[test]
    fn test_zero_baseline_rejected() {
        let mut p = pair(8, 6);
        p.right_info.baseline = 0.0;
        assert!(FrameAdapter::frame_from_stereo(p).is_err());
    }

    #[test]
    fn test_pose_yaw_extracted() {
        let half = 0.25_f64;
        let sample =
            FrameAdapter::sample_from_pose(&pose([1.0, 2.0, 0.0], [0.0, 0.0, half.sin(), half.cos()]))
                .unwrap();
        assert_relative_eq!(sample.pose.x, 1.0);
        assert_relative_eq!(sample.pose.y, 2.0);
        assert_relative_eq!(sample.pose.theta, 0.5, epsilon = 1e-12);
        assert_eq!(sample.timestamp_us, 7);
    }

    #[test]
    fn test_unnormalized_quaternion_accepted() {
        let half = 0.25_f64;
        let sample = FrameAdapter::sample_from_pose(&pose(
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 3.0 * half.sin(), 3.0 * half.cos()],
        ))
        .unwrap();
        assert_relative_eq!(sample.pose.theta, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_pose_rejected() {
        let err = FrameAdapter::sample_from_pose(&pose([f64::NAN, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]))
            .unwrap_err();
        assert_eq!(err, InputRejected::NonFinite("position"));

        let err =
            FrameAdapter::sample_from_pose(&pose([0.0, 0.0, 0.0], [0.0, 0.0, f64::INFINITY, 1.0]))
                .unwrap_err();
        assert_eq!(err, InputRejected::NonFinite("orientation"));

        let err = FrameAdapter::sample_from_pose(&pose([0.0, 0.0, 0.0], [0.0; 4])).unwrap_err();
        assert_eq!(err, InputRejected::DegenerateOrientation);
    }

    #[test]
    fn test_drops_are_counted() {
        let adapter = FrameAdapter::new();
        let stats = adapter.stats();

        let mut bad = pair(8, 6);
        bad.left_info.height = 7;
        assert!(adapter.adapt(SensorMessage::Stereo(bad)).is_none());
        assert!(adapter.adapt(SensorMessage::Stereo(pair(8, 6))).is_some());
        assert!(
            adapter
                .adapt(SensorMessage::Pose(pose([f64::INFINITY, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0])))
                .is_none()
        );
        assert!(
            adapter
                .adapt(SensorMessage::Pose(pose([1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0])))
                .is_some()
        );

        let counts = stats.counts();
        assert_eq!(counts.frames_accepted, 1);
        assert_eq!(counts.frames_dropped, 1);
        assert_eq!(counts.samples_accepted, 1);
        assert_eq!(counts.samples_dropped, 1);
        assert_eq!(counts.dropped(), 2);
    }
}
