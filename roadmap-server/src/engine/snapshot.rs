//! Immutable roadmap snapshot handed to sinks.

use super::skeleton::Edge;
use crate::core::types::Pose2D;

/// Point-in-time copy of the skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadmapSnapshot {
    /// Publication time (microseconds).
    pub timestamp_us: u64,
    /// Node poses, indexed by node id.
    pub nodes: Vec<Pose2D>,
    pub edges: Vec<Edge>,
    /// Current node; `None` while the graph is empty.
    pub localization: Option<usize>,
    /// Skeleton revision the snapshot was taken at.
    pub revision: u64,
}

impl RoadmapSnapshot {
    /// Same graph content, ignoring timestamp.
    pub fn same_content(&self, other: &RoadmapSnapshot) -> bool {
        self.nodes == other.nodes
            && self.edges == other.edges
            && self.localization == other.localization
    }
}
