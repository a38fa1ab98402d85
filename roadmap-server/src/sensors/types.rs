//! Sensor payloads as delivered by the source, before validation.
//!
//! These are fixed-schema structs decoded from the wire. Nothing here is
//! trusted until it passes through [`FrameAdapter`](super::FrameAdapter).

/// Side of a stereo rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoSide {
    Left,
    Right,
}

impl std::fmt::Display for StereoSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StereoSide::Left => write!(f, "left"),
            StereoSide::Right => write!(f, "right"),
        }
    }
}

/// Calibration metadata for one camera of the rig.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    /// Calibrated image width in pixels.
    pub width: u32,
    /// Calibrated image height in pixels.
    pub height: u32,
    /// Focal length x (pixels).
    pub fx: f64,
    /// Focal length y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
    /// Stereo baseline in meters (meaningful on the right camera).
    pub baseline: f64,
}

/// 8-bit grayscale image.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoImage {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels, `width * height` bytes.
    pub data: Vec<u8>,
}

impl MonoImage {
    /// Number of bytes a well-formed buffer holds.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Raw stereo capture with per-camera calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoPair {
    /// Capture timestamp in microseconds.
    pub timestamp_us: u64,
    pub left_info: CameraInfo,
    pub right_info: CameraInfo,
    pub left: MonoImage,
    pub right: MonoImage,
}

/// Filtered localized pose from an external localizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizedPose {
    /// Measurement timestamp in microseconds.
    pub timestamp_us: u64,
    /// Position (x, y, z) in meters.
    pub position: [f64; 3],
    /// Orientation quaternion (x, y, z, w).
    pub orientation: [f64; 4],
}

/// One message from the sensor/pose source.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorMessage {
    Stereo(StereoPair),
    Pose(LocalizedPose),
}

impl SensorMessage {
    /// Source timestamp in microseconds.
    pub fn timestamp_us(&self) -> u64 {
        match self {
            SensorMessage::Stereo(pair) => pair.timestamp_us,
            SensorMessage::Pose(pose) => pose.timestamp_us,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SensorMessage::Stereo(_) => "stereo",
            SensorMessage::Pose(_) => "pose",
        }
    }
}
