//! Odometry boundary.
//!
//! The roadmap only needs one thing from visual odometry: a keyframe event
//! carrying an absolute pose whenever the tracker decides the view is
//! qualitatively new. Everything behind that contract is pluggable:
//!
//! - [`Odometer`]: the boundary consumed by the server
//! - [`FeaturePipeline`]: capability set (extract, describe, estimate motion)
//! - [`VisualOdometer`]: reference-keyframe tracker over a pipeline
//! - [`StubPipeline`], [`ScriptedOdometer`]: scripted stand-ins

mod pipeline;
mod stub;
mod visual;

pub use pipeline::{Descriptor, FeaturePipeline, FeatureSet, Keypoint, MotionEstimate};
pub use stub::{OdometryScript, ScriptStep, ScriptedMotion, ScriptedOdometer, StubPipeline};
pub use visual::{VisualOdometer, VisualOdometerConfig};

use crate::core::types::Pose3D;
use crate::error::Result;
use crate::sensors::Frame;

/// First frame id used when continuing a persisted graph, so keyframes of
/// the new session never collide with imported ones.
pub const LOADED_GRAPH_FIRST_FRAME: u64 = 100_000;

/// Keyframe declared by the odometry boundary.
#[derive(Debug, Clone)]
pub struct KeyframeEvent {
    /// Frame counter value of the originating frame.
    pub id: u64,
    /// Absolute pose of the keyframe.
    pub pose: Pose3D,
    /// The frame that became the keyframe.
    pub frame: Frame,
}

/// Result of feeding one frame to the odometry boundary.
#[derive(Debug, Clone)]
pub enum OdometryEvent {
    /// Frame tracked against the current keyframe.
    Tracking {
        /// Tracking quality in [0, 1].
        confidence: f64,
    },
    /// Frame promoted to a keyframe.
    Keyframe(KeyframeEvent),
    /// Tracking lost; no pose for this frame.
    Lost,
}

/// Odometry engine consuming frames in arrival order.
///
/// Implementations emit at most one event per frame, in frame order.
pub trait Odometer: Send {
    /// Process the next frame.
    fn handle_frame(&mut self, frame: Frame) -> Result<OdometryEvent>;
}

impl<O: Odometer + ?Sized> Odometer for Box<O> {
    fn handle_frame(&mut self, frame: Frame) -> Result<OdometryEvent> {
        (**self).handle_frame(frame)
    }
}
