//! Protobuf messages exchanged with the sensor source and roadmap clients.
//!
//! Field numbers are part of the wire contract and must not be reused.
//!
//! ```text
//! message Roadmap {
//!   uint64 timestamp_us = 1;
//!   repeated Node nodes = 2;
//!   repeated Edge edges = 3;
//!   double localization = 4;
//! }
//! message Node { double x = 1; double y = 2; double theta = 3; }
//! message Edge { uint32 a = 1; uint32 b = 2; }
//!
//! message SensorEnvelope {
//!   uint64 timestamp_us = 1;
//!   oneof payload { RawStereo raw_stereo = 2; LocalizedPose localized_pose = 3; }
//! }
//! ```

use crate::engine::RoadmapSnapshot;
use crate::error::{Result, RoadmapError};
use crate::sensors;

/// Published roadmap.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Roadmap {
    #[prost(uint64, tag = "1")]
    pub timestamp_us: u64,
    #[prost(message, repeated, tag = "2")]
    pub nodes: Vec<Node>,
    #[prost(message, repeated, tag = "3")]
    pub edges: Vec<Edge>,
    /// Index of the current node; 0 while the roadmap is empty.
    #[prost(double, tag = "4")]
    pub localization: f64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Node {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub theta: f64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Edge {
    #[prost(uint32, tag = "1")]
    pub a: u32,
    #[prost(uint32, tag = "2")]
    pub b: u32,
}

/// Node indices travel as `uint32`; a roadmap past `u32::MAX` nodes cannot
/// be encoded.
impl TryFrom<&RoadmapSnapshot> for Roadmap {
    type Error = RoadmapError;

    fn try_from(snapshot: &RoadmapSnapshot) -> Result<Self> {
        let index = |i: usize| {
            u32::try_from(i).map_err(|_| {
                RoadmapError::InvalidGraph(format!("node index {} does not fit the wire format", i))
            })
        };

        let edges = snapshot
            .edges
            .iter()
            .map(|e| {
                Ok(Edge {
                    a: index(e.a)?,
                    b: index(e.b)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Roadmap {
            timestamp_us: snapshot.timestamp_us,
            nodes: snapshot
                .nodes
                .iter()
                .map(|p| Node {
                    x: p.x,
                    y: p.y,
                    theta: p.theta,
                })
                .collect(),
            edges,
            localization: snapshot.localization.unwrap_or(0) as f64,
        })
    }
}

/// One message from the sensor source.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SensorEnvelope {
    #[prost(uint64, tag = "1")]
    pub timestamp_us: u64,
    #[prost(oneof = "sensor_envelope::Payload", tags = "2, 3")]
    pub payload: Option<sensor_envelope::Payload>,
}

pub mod sensor_envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        RawStereo(super::RawStereo),
        #[prost(message, tag = "3")]
        LocalizedPose(super::LocalizedPose),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawStereo {
    #[prost(message, optional, tag = "1")]
    pub left_info: Option<CameraInfo>,
    #[prost(message, optional, tag = "2")]
    pub right_info: Option<CameraInfo>,
    #[prost(message, optional, tag = "3")]
    pub left: Option<Image>,
    #[prost(message, optional, tag = "4")]
    pub right: Option<Image>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CameraInfo {
    #[prost(uint32, tag = "1")]
    pub width: u32,
    #[prost(uint32, tag = "2")]
    pub height: u32,
    #[prost(double, tag = "3")]
    pub fx: f64,
    #[prost(double, tag = "4")]
    pub fy: f64,
    #[prost(double, tag = "5")]
    pub cx: f64,
    #[prost(double, tag = "6")]
    pub cy: f64,
    #[prost(double, tag = "7")]
    pub baseline: f64,
}

/// Mono8 image.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Image {
    #[prost(uint32, tag = "1")]
    pub width: u32,
    #[prost(uint32, tag = "2")]
    pub height: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct LocalizedPose {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub z: f64,
    #[prost(double, tag = "4")]
    pub qx: f64,
    #[prost(double, tag = "5")]
    pub qy: f64,
    #[prost(double, tag = "6")]
    pub qz: f64,
    #[prost(double, tag = "7")]
    pub qw: f64,
}

impl From<CameraInfo> for sensors::CameraInfo {
    fn from(info: CameraInfo) -> Self {
        sensors::CameraInfo {
            width: info.width,
            height: info.height,
            fx: info.fx,
            fy: info.fy,
            cx: info.cx,
            cy: info.cy,
            baseline: info.baseline,
        }
    }
}

impl From<Image> for sensors::MonoImage {
    fn from(image: Image) -> Self {
        sensors::MonoImage {
            width: image.width,
            height: image.height,
            data: image.data,
        }
    }
}

fn required<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| RoadmapError::Decode(format!("raw_stereo missing {}", name)))
}

impl TryFrom<SensorEnvelope> for sensors::SensorMessage {
    type Error = RoadmapError;

    fn try_from(envelope: SensorEnvelope) -> Result<Self> {
        use sensor_envelope::Payload;

        let timestamp_us = envelope.timestamp_us;
        match envelope.payload {
            Some(Payload::RawStereo(raw)) => Ok(sensors::SensorMessage::Stereo(sensors::StereoPair {
                timestamp_us,
                left_info: required(raw.left_info, "left_info")?.into(),
                right_info: required(raw.right_info, "right_info")?.into(),
                left: required(raw.left, "left")?.into(),
                right: required(raw.right, "right")?.into(),
            })),
            Some(Payload::LocalizedPose(p)) => Ok(sensors::SensorMessage::Pose(sensors::LocalizedPose {
                timestamp_us,
                position: [p.x, p.y, p.z],
                orientation: [p.qx, p.qy, p.qz, p.qw],
            })),
            None => Err(RoadmapError::Decode("sensor envelope without payload".to_string())),
        }
    }
}

impl From<&sensors::SensorMessage> for SensorEnvelope {
    fn from(message: &sensors::SensorMessage) -> Self {
        use sensor_envelope::Payload;

        let camera = |info: &sensors::CameraInfo| CameraInfo {
            width: info.width,
            height: info.height,
            fx: info.fx,
            fy: info.fy,
            cx: info.cx,
            cy: info.cy,
            baseline: info.baseline,
        };
        let image = |img: &sensors::MonoImage| Image {
            width: img.width,
            height: img.height,
            data: img.data.clone(),
        };

        let payload = match message {
            sensors::SensorMessage::Stereo(pair) => Payload::RawStereo(RawStereo {
                left_info: Some(camera(&pair.left_info)),
                right_info: Some(camera(&pair.right_info)),
                left: Some(image(&pair.left)),
                right: Some(image(&pair.right)),
            }),
            sensors::SensorMessage::Pose(pose) => Payload::LocalizedPose(LocalizedPose {
                x: pose.position[0],
                y: pose.position[1],
                z: pose.position[2],
                qx: pose.orientation[0],
                qy: pose.orientation[1],
                qz: pose.orientation[2],
                qw: pose.orientation[3],
            }),
        };

        SensorEnvelope {
            timestamp_us: message.timestamp_us(),
            payload: Some(payload),
        }
    }
}
