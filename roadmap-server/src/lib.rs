//! Roadmap server - topological pose graph for mobile robots
//!
//! Builds a "skeleton" of the places the robot has been, incrementally,
//! from a live sensor/pose stream, and publishes it together with the node
//! the robot currently sits on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      main                           │  ← Entry point
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                server/, state/                      │  ← Orchestration
//! │        (ingestion loop, shared skeleton)            │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │        (proto, framing, source, streaming)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Roadmap
//! │   (skeleton, publisher, persistence, optimizer)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │              sensors/, odometry/                    │  ← Input
//! │        (frame/pose adapter, keyframe boundary)      │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modes
//!
//! - **Keyframe**: stereo frames feed an [`Odometer`]; each keyframe becomes
//!   a node linked to the previous one.
//! - **Threshold**: localized poses become nodes once they moved more than
//!   1 m or turned more than 2° since the last node, and are linked to every
//!   earlier node within 1.5 m.

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;
pub mod error;
pub mod utils;

// ============================================================================
// Layer 2: Input (depends on core)
// ============================================================================
pub mod odometry;
pub mod sensors;

// ============================================================================
// Layer 3: Roadmap engine (depends on core, sensors, odometry)
// ============================================================================
pub mod engine;
pub mod state;

// ============================================================================
// Layer 4: I/O infrastructure
// ============================================================================
pub mod io;

// ============================================================================
// Layer 5: Server and configuration
// ============================================================================
pub mod config;
pub mod server;

// ============================================================================
// Convenience re-exports
// ============================================================================

pub use crate::core::types::{PlanarProjection, Point2D, Pose2D, Pose3D};
pub use error::{Result, RoadmapError};

pub use sensors::{AdaptedInput, Frame, FrameAdapter, InputRejected, PoseSample, SensorMessage};

pub use odometry::{
    FeaturePipeline, KeyframeEvent, OdometryEvent, OdometryScript, Odometer, ScriptedOdometer,
    StubPipeline, VisualOdometer, VisualOdometerConfig,
};

pub use engine::{
    Admission, Edge, GraphState, GraphStore, Node, NoopRelaxer, PoseRelaxer, PublishReason,
    PublisherConfig, RoadmapPublisher, RoadmapSink, RoadmapSnapshot, Skeleton, SkeletonConfig,
    YamlGraphStore,
};
pub use state::{SharedSkeleton, create_shared_skeleton};

pub use io::source::{ReceiverConfig, TcpSensorReceiver};
pub use io::streaming::{ChannelSink, TcpRoadmapPublisher};

pub use config::RoadmapConfig;
pub use server::{IngestionMode, ModeKind, RoadmapServer, ServerConfig, ServerThread};
