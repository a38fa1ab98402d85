//! Scripted stand-ins for the external odometry collaborators.
//!
//! [`StubPipeline`] replays motion estimates through the real
//! [`VisualOdometer`](super::VisualOdometer). [`ScriptedOdometer`] skips the
//! pipeline entirely and emits a fixed sequence of events, one per frame.
//! Either can be driven from a YAML [`OdometryScript`] so the daemon runs
//! keyframe mode against recorded trajectories:
//!
//! ```yaml
//! # absolute keyframe events, one per frame
//! steps:
//!   - { kind: keyframe, z: 0.0 }
//!   - { kind: tracking, confidence: 0.8 }
//!   - { kind: keyframe, z: 0.3, pitch: 0.05 }
//! ```
//!
//! ```yaml
//! # motions relative to the reference keyframe, through the visual odometer
//! motions:
//!   - { z: 0.1, inliers: 150 }
//!   - { z: 0.25, inliers: 150 }
//! ```

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use nalgebra::{Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use super::pipeline::{Descriptor, FeaturePipeline, FeatureSet, Keypoint, MotionEstimate};
use super::visual::{VisualOdometer, VisualOdometerConfig};
use super::{KeyframeEvent, OdometryEvent, Odometer};
use crate::core::types::Pose3D;
use crate::error::{Result, RoadmapError};
use crate::sensors::{Frame, StereoCamera};

/// Synthetic keypoints reported per frame.
const STUB_KEYPOINTS: usize = 200;

/// Feature pipeline that returns synthetic features and scripted motions.
#[derive(Debug, Clone)]
pub struct StubPipeline {
    motions: VecDeque<Option<MotionEstimate>>,
}

impl StubPipeline {
    /// Motions are consumed one per `estimate_motion` call; once exhausted
    /// every estimate fails.
    pub fn new(motions: Vec<Option<MotionEstimate>>) -> Self {
        Self {
            motions: motions.into(),
        }
    }
}

impl FeaturePipeline for StubPipeline {
    fn extract_features(&mut self, frame: &Frame) -> Result<Vec<Keypoint>> {
        let width = frame.camera.width.max(1) as usize;
        Ok((0..STUB_KEYPOINTS)
            .map(|i| Keypoint {
                x: (i % width) as f32,
                y: (i / width) as f32,
                disparity: 1.0,
                response: 1.0,
            })
            .collect())
    }

    fn describe(&mut self, _frame: &Frame, keypoints: &[Keypoint]) -> Result<Vec<Descriptor>> {
        Ok(vec![Descriptor::default(); keypoints.len()])
    }

    fn estimate_motion(
        &mut self,
        _reference: &FeatureSet,
        _current: &FeatureSet,
        _camera: &StereoCamera,
    ) -> Option<MotionEstimate> {
        self.motions.pop_front().flatten()
    }
}

/// One scripted odometry outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScriptStep {
    /// Declare a keyframe at this absolute pose (meters, radians).
    Keyframe {
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        z: f64,
        #[serde(default)]
        roll: f64,
        #[serde(default)]
        pitch: f64,
        #[serde(default)]
        yaw: f64,
    },
    /// Track the frame without a keyframe.
    Tracking {
        #[serde(default = "default_confidence")]
        confidence: f64,
    },
    /// Lose tracking for this frame.
    Lost,
    /// Fail with an odometry error.
    Fail {
        #[serde(default)]
        reason: String,
    },
}

fn default_confidence() -> f64 {
    1.0
}

fn default_inliers() -> usize {
    200
}

fn pose_from_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Pose3D {
    Pose3D::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    )
}

/// Motion of a frame relative to the reference keyframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedMotion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    /// Correspondences supporting the motion.
    #[serde(default = "default_inliers")]
    pub inliers: usize,
}

impl ScriptedMotion {
    pub fn estimate(&self) -> MotionEstimate {
        MotionEstimate {
            delta: pose_from_euler(self.x, self.y, self.z, self.roll, self.pitch, self.yaw),
            inliers: self.inliers,
        }
    }
}

impl ScriptStep {
    /// Keyframe step from a 6-DOF pose.
    pub fn keyframe(pose: &Pose3D) -> Self {
        let t = &pose.translation.vector;
        let (roll, pitch, yaw) = pose.rotation.euler_angles();
        ScriptStep::Keyframe {
            x: t.x,
            y: t.y,
            z: t.z,
            roll,
            pitch,
            yaw,
        }
    }
}

/// Scripted odometry: either absolute `steps` or relative `motions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OdometryScript {
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
    #[serde(default)]
    pub motions: Vec<ScriptedMotion>,
}

impl OdometryScript {
    /// Load a script from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RoadmapError::Config(format!("failed to read odometry script {:?}: {}", path, e))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            RoadmapError::Config(format!("failed to parse odometry script {:?}: {}", path, e))
        })
    }

    /// Build the odometer this script describes.
    ///
    /// `steps` replay events directly. `motions` run through a
    /// [`VisualOdometer`] so its keyframe thresholds apply.
    pub fn into_odometer(self, config: VisualOdometerConfig) -> Result<Box<dyn Odometer>> {
        match (self.steps.is_empty(), self.motions.is_empty()) {
            (false, false) => Err(RoadmapError::Config(
                "odometry script must contain either steps or motions, not both".to_string(),
            )),
            (true, false) => {
                let motions = self.motions.iter().map(|m| Some(m.estimate())).collect();
                Ok(Box::new(VisualOdometer::new(StubPipeline::new(motions), config)))
            }
            _ => Ok(Box::new(ScriptedOdometer::new(self, config.first_frame_id))),
        }
    }
}

/// Odometry boundary that replays a script, one step per frame.
#[derive(Debug, Clone)]
pub struct ScriptedOdometer {
    steps: VecDeque<ScriptStep>,
    next_frame_id: u64,
}

impl ScriptedOdometer {
    /// Create from a script; frames beyond the script are reported lost.
    pub fn new(script: OdometryScript, first_frame_id: u64) -> Self {
        Self {
            steps: script.steps.into(),
            next_frame_id: first_frame_id,
        }
    }

    /// Convenience constructor: every frame becomes a keyframe at the given pose.
    pub fn from_keyframes(poses: &[Pose3D]) -> Self {
        let steps = poses.iter().map(ScriptStep::keyframe).collect();
        Self::new(
            OdometryScript {
                steps,
                motions: Vec::new(),
            },
            0,
        )
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl Odometer for ScriptedOdometer {
    fn handle_frame(&mut self, frame: Frame) -> Result<OdometryEvent> {
        let id = self.next_frame_id;
        self.next_frame_id += 1;

        match self.steps.pop_front() {
            Some(ScriptStep::Keyframe {
                x,
                y,
                z,
                roll,
                pitch,
                yaw,
            }) => {
                let pose = pose_from_euler(x, y, z, roll, pitch, yaw);
                Ok(OdometryEvent::Keyframe(KeyframeEvent { id, pose, frame }))
            }
            Some(ScriptStep::Tracking { confidence }) => Ok(OdometryEvent::Tracking { confidence }),
            Some(ScriptStep::Lost) | None => Ok(OdometryEvent::Lost),
            Some(ScriptStep::Fail { reason }) => Err(RoadmapError::Odometry(reason)),
        }
    }
}
