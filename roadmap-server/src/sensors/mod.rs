//! Sensor input handling.
//!
//! - `types`: raw payloads decoded from the source wire format
//! - `adapter`: validation into frames and pose samples

mod adapter;
mod types;

pub use adapter::{
    AdaptedInput, AdapterCounts, AdapterStats, Frame, FrameAdapter, InputRejected, PoseSample,
    StereoCamera,
};
pub use types::{CameraInfo, LocalizedPose, MonoImage, SensorMessage, StereoPair, StereoSide};
