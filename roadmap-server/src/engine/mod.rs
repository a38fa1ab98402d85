//! Roadmap engine: skeleton construction and publication.
//!
//! - [`Skeleton`]: nodes, edges and localization with both admission modes
//! - [`RoadmapPublisher`]: initial, change and heartbeat publication
//! - [`GraphStore`], [`PoseRelaxer`]: persistence and optimization hooks

mod optimizer;
mod persistence;
mod publisher;
mod skeleton;
mod snapshot;

pub use optimizer::{NoopRelaxer, PoseRelaxer};
pub use persistence::{GraphStore, YamlGraphStore};
pub use publisher::{PublishReason, PublisherConfig, RoadmapPublisher, RoadmapSink};
pub use skeleton::{Admission, Edge, GraphState, Node, Skeleton, SkeletonConfig};
pub use snapshot::RoadmapSnapshot;
