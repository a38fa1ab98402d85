//! Feature pipeline capability set.

use crate::core::types::Pose3D;
use crate::error::Result;
use crate::sensors::{Frame, StereoCamera};

/// Image feature with stereo disparity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Column in the left image (pixels).
    pub x: f32,
    /// Row in the left image (pixels).
    pub y: f32,
    /// Left-right disparity (pixels).
    pub disparity: f32,
    /// Detector response.
    pub response: f32,
}

/// Opaque binary descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Descriptor(pub Vec<u8>);

/// Keypoints and their descriptors for one frame.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Relative motion between two feature sets.
#[derive(Debug, Clone, Copy)]
pub struct MotionEstimate {
    /// Pose of the current frame expressed in the reference frame.
    pub delta: Pose3D,
    /// Number of correspondences consistent with `delta`.
    pub inliers: usize,
}

/// Detection, description and motion estimation supplied from outside.
///
/// The roadmap never looks inside these; [`VisualOdometer`](super::VisualOdometer)
/// only sequences the three calls.
pub trait FeaturePipeline: Send {
    /// Detect keypoints in the frame.
    fn extract_features(&mut self, frame: &Frame) -> Result<Vec<Keypoint>>;

    /// Compute one descriptor per keypoint.
    fn describe(&mut self, frame: &Frame, keypoints: &[Keypoint]) -> Result<Vec<Descriptor>>;

    /// Estimate the motion from `reference` to `current`, or `None` if no
    /// consistent motion was found.
    fn estimate_motion(
        &mut self,
        reference: &FeatureSet,
        current: &FeatureSet,
        camera: &StereoCamera,
    ) -> Option<MotionEstimate>;
}
