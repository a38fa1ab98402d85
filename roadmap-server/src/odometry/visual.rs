//! Reference-keyframe visual odometer.
//!
//! Tracks every frame against the most recent keyframe. A frame is promoted
//! to keyframe when it has moved or turned far enough from the reference, or
//! when the overlap with the reference (inlier count) is getting thin.

use super::pipeline::{FeaturePipeline, FeatureSet};
use super::{KeyframeEvent, OdometryEvent, Odometer};
use crate::core::types::Pose3D;
use crate::error::{Result, RoadmapError};
use crate::sensors::Frame;

/// Configuration for keyframe selection.
#[derive(Debug, Clone)]
pub struct VisualOdometerConfig {
    /// Translation from the reference keyframe (meters) that forces a new keyframe.
    pub position_keyframe_thresh: f64,

    /// Rotation from the reference keyframe (radians) that forces a new keyframe.
    pub angle_keyframe_thresh: f64,

    /// Inlier count below which the reference is considered stale.
    pub inlier_thresh: usize,

    /// Inlier count below which tracking is lost.
    pub min_inliers: usize,

    /// Id assigned to the first frame.
    pub first_frame_id: u64,
}

impl Default for VisualOdometerConfig {
    fn default() -> Self {
        Self {
            position_keyframe_thresh: 0.2,
            angle_keyframe_thresh: 0.15,
            inlier_thresh: 100,
            min_inliers: 10,
            first_frame_id: 0,
        }
    }
}

struct Reference {
    features: FeatureSet,
    pose: Pose3D,
}

/// Visual odometer driving a [`FeaturePipeline`].
pub struct VisualOdometer<P: FeaturePipeline> {
    pipeline: P,
    config: VisualOdometerConfig,
    reference: Option<Reference>,
    pose: Pose3D,
    next_frame_id: u64,
    num_keyframes: u64,
}

impl<P: FeaturePipeline> VisualOdometer<P> {
    /// Create an odometer. The first frame becomes a keyframe at the origin.
    pub fn new(pipeline: P, config: VisualOdometerConfig) -> Self {
        let next_frame_id = config.first_frame_id;
        Self {
            pipeline,
            config,
            reference: None,
            pose: Pose3D::identity(),
            next_frame_id,
            num_keyframes: 0,
        }
    }

    /// Latest tracked absolute pose.
    pub fn pose(&self) -> &Pose3D {
        &self.pose
    }

    /// Number of keyframes declared so far.
    pub fn num_keyframes(&self) -> u64 {
        self.num_keyframes
    }

    /// Number of frames consumed so far.
    pub fn num_frames(&self) -> u64 {
        self.next_frame_id - self.config.first_frame_id
    }

    fn promote(&mut self, id: u64, features: FeatureSet, pose: Pose3D, frame: Frame) -> OdometryEvent {
        self.reference = Some(Reference { features, pose });
        self.pose = pose;
        self.num_keyframes += 1;
        OdometryEvent::Keyframe(KeyframeEvent { id, pose, frame })
    }
}

impl<P: FeaturePipeline> Odometer for VisualOdometer<P> {
    fn handle_frame(&mut self, frame: Frame) -> Result<OdometryEvent> {
        let id = self.next_frame_id;
        self.next_frame_id += 1;

        let keypoints = self.pipeline.extract_features(&frame)?;
        let descriptors = self.pipeline.describe(&frame, &keypoints)?;
        if descriptors.len() != keypoints.len() {
            return Err(RoadmapError::Odometry(format!(
                "pipeline described {} of {} keypoints",
                descriptors.len(),
                keypoints.len()
            )));
        }
        let features = FeatureSet {
            keypoints,
            descriptors,
        };

        let Some(reference) = &self.reference else {
            return Ok(self.promote(id, features, Pose3D::identity(), frame));
        };

        let motion = match self
            .pipeline
            .estimate_motion(&reference.features, &features, &frame.camera)
        {
            Some(m) if m.inliers >= self.config.min_inliers => m,
            Some(m) => {
                log::warn!(
                    "Frame {}: tracking lost ({} inliers < {})",
                    id,
                    m.inliers,
                    self.config.min_inliers
                );
                return Ok(OdometryEvent::Lost);
            }
            None => {
                log::warn!("Frame {}: tracking lost (no motion estimate)", id);
                return Ok(OdometryEvent::Lost);
            }
        };

        let pose = reference.pose * motion.delta;
        let translation = motion.delta.translation.vector.norm();
        let rotation = motion.delta.rotation.angle();

        if translation > self.config.position_keyframe_thresh
            || rotation > self.config.angle_keyframe_thresh
            || motion.inliers < self.config.inlier_thresh
        {
            log::debug!(
                "Frame {}: keyframe (moved {:.3}m, turned {:.3}rad, {} inliers)",
                id,
                translation,
                rotation,
                motion.inliers
            );
            return Ok(self.promote(id, features, pose, frame));
        }

        self.pose = pose;
        let confidence = if self.config.inlier_thresh == 0 {
            1.0
        } else {
            (motion.inliers as f64 / self.config.inlier_thresh as f64).min(1.0)
        };
        Ok(OdometryEvent::Tracking { confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odometry::{MotionEstimate, StubPipeline};
    use crate::sensors::{MonoImage, StereoCamera};
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn frame(timestamp_us: u64) -> Frame {
        Frame {
            timestamp_us,
            camera: StereoCamera {
                width: 4,
                height: 4,
                fx: 389.0,
                fy: 389.0,
                cx_left: 2.0,
                cx_right: 2.0,
                cy: 2.0,
                baseline: 0.089,
            },
            left: MonoImage {
                width: 4,
                height: 4,
                data: vec![0; 16],
            },
            right: MonoImage {
                width: 4,
                height: 4,
                data: vec![0; 16],
            },
        }
    }

    fn forward(z: f64, inliers: usize) -> Option<MotionEstimate> {
        Some(MotionEstimate {
            delta: Pose3D::translation(0.0, 0.0, z),
            inliers,
        })
    }

    fn keyframe_pose(event: OdometryEvent) -> Pose3D {
        match event {
            OdometryEvent::Keyframe(kf) => kf.pose,
            other => panic!("expected keyframe, got {:?}", other),
        }
    }

    #[test]
    fn test_first_frame_is_keyframe_at_origin() {
        let mut vo = VisualOdometer::new(StubPipeline::new(vec![]), VisualOdometerConfig::default());
        let pose = keyframe_pose(vo.handle_frame(frame(0)).unwrap());
        assert_relative_eq!(pose.translation.vector.norm(), 0.0);
        assert_eq!(vo.num_keyframes(), 1);
    }

    #[test]
    fn test_small_motion_tracks_without_keyframe() {
        let pipeline = StubPipeline::new(vec![forward(0.05, 150)]);
        let mut vo = VisualOdometer::new(pipeline, VisualOdometerConfig::default());

        vo.handle_frame(frame(0)).unwrap();
        match vo.handle_frame(frame(1)).unwrap() {
            OdometryEvent::Tracking { confidence } => assert_relative_eq!(confidence, 1.0),
            other => panic!("expected tracking, got {:?}", other),
        }
        assert_eq!(vo.num_keyframes(), 1);
        assert_relative_eq!(vo.pose().translation.z, 0.05);
    }

    #[test]
    fn test_translation_threshold_promotes_keyframe() {
        let pipeline = StubPipeline::new(vec![forward(0.1, 150), forward(0.25, 150)]);
        let mut vo = VisualOdometer::new(pipeline, VisualOdometerConfig::default());

        vo.handle_frame(frame(0)).unwrap();
        assert!(matches!(
            vo.handle_frame(frame(1)).unwrap(),
            OdometryEvent::Tracking { .. }
        ));
        let pose = keyframe_pose(vo.handle_frame(frame(2)).unwrap());
        assert_relative_eq!(pose.translation.z, 0.25);
    }

    #[test]
    fn test_keyframe_poses_chain() {
        let pipeline = StubPipeline::new(vec![forward(0.3, 150), forward(0.3, 150)]);
        let mut vo = VisualOdometer::new(pipeline, VisualOdometerConfig::default());

        vo.handle_frame(frame(0)).unwrap();
        vo.handle_frame(frame(1)).unwrap();
        let pose = keyframe_pose(vo.handle_frame(frame(2)).unwrap());
        assert_relative_eq!(pose.translation.z, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_threshold_promotes_keyframe() {
        let turn = MotionEstimate {
            delta: Pose3D::from_parts(
                Translation3::new(0.0, 0.0, 0.0),
                UnitQuaternion::from_euler_angles(0.0, 0.2, 0.0),
            ),
            inliers: 150,
        };
        let mut vo = VisualOdometer::new(StubPipeline::new(vec![Some(turn)]), VisualOdometerConfig::default());

        vo.handle_frame(frame(0)).unwrap();
        assert!(matches!(
            vo.handle_frame(frame(1)).unwrap(),
            OdometryEvent::Keyframe(_)
        ));
    }

    #[test]
    fn test_thin_overlap_promotes_keyframe() {
        let pipeline = StubPipeline::new(vec![forward(0.01, 40)]);
        let mut vo = VisualOdometer::new(pipeline, VisualOdometerConfig::default());

        vo.handle_frame(frame(0)).unwrap();
        assert!(matches!(
            vo.handle_frame(frame(1)).unwrap(),
            OdometryEvent::Keyframe(_)
        ));
    }

    #[test]
    fn test_too_few_inliers_is_lost() {
        let pipeline = StubPipeline::new(vec![forward(0.5, 3), None]);
        let mut vo = VisualOdometer::new(pipeline, VisualOdometerConfig::default());

        vo.handle_frame(frame(0)).unwrap();
        assert!(matches!(vo.handle_frame(frame(1)).unwrap(), OdometryEvent::Lost));
        assert!(matches!(vo.handle_frame(frame(2)).unwrap(), OdometryEvent::Lost));
        assert_eq!(vo.num_keyframes(), 1);
        assert_eq!(vo.num_frames(), 3);
    }

    #[test]
    fn test_first_frame_id_offsets_keyframe_ids() {
        let config = VisualOdometerConfig {
            first_frame_id: 100_000,
            ..Default::default()
        };
        let mut vo = VisualOdometer::new(StubPipeline::new(vec![]), config);
        match vo.handle_frame(frame(0)).unwrap() {
            OdometryEvent::Keyframe(kf) => assert_eq!(kf.id, 100_000),
            other => panic!("expected keyframe, got {:?}", other),
        }
    }
}
