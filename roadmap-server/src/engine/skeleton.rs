//! Topological pose graph ("skeleton").
//!
//! Nodes are planar poses appended in admission order; their index is their
//! identity and is never reused. Edges are ordered index pairs. The
//! localization index points at the node the robot currently sits on.
//!
//! Two admission paths feed the graph, selected once per server:
//!
//! - [`Skeleton::admit_keyframe`]: every odometry keyframe becomes a node,
//!   chained to its predecessor.
//! - [`Skeleton::admit_pose_sample`]: a localized pose becomes a node only
//!   when it has moved or turned far enough from the last admitted node, and
//!   is linked to every earlier node within the proximity radius.
//!
//! Every mutation bumps [`Skeleton::revision`], which the publisher uses for
//! change detection.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::optimizer::PoseRelaxer;
use super::persistence::GraphStore;
use super::snapshot::RoadmapSnapshot;
use crate::core::math::angle_diff;
use crate::core::types::{PlanarProjection, Pose2D};
use crate::error::{Result, RoadmapError};
use crate::odometry::KeyframeEvent;
use crate::sensors::PoseSample;

/// Graph node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Planar pose (meters, radians).
    pub pose: Pose2D,
    /// Admission timestamp (microseconds).
    #[serde(default)]
    pub timestamp_us: u64,
    /// Originating keyframe id, when admitted from odometry.
    #[serde(default)]
    pub keyframe_id: Option<u64>,
}

/// Directed index pair. Sequential and proximity edges share this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
}

impl Edge {
    pub fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }
}

/// Admission thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    /// Minimum travel from the last node before a sample is admitted (meters).
    pub admit_distance: f64,
    /// Minimum heading change from the last node before a sample is admitted (radians).
    pub admit_angle: f64,
    /// Nodes closer than this are linked on admission (meters).
    pub proximity_distance: f64,
    /// How keyframe poses are flattened onto the map plane.
    pub projection: PlanarProjection,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            admit_distance: 1.0,
            admit_angle: 2.0_f64.to_radians(),
            proximity_distance: 1.5,
            projection: PlanarProjection::default(),
        }
    }
}

/// Outcome of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A node was appended.
    Admitted { index: usize, edges_added: usize },
    /// Input was too close to the last node; graph unchanged.
    Suppressed,
}

impl Admission {
    /// Whether the graph changed.
    pub fn changed(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Exportable graph content, used by persistence and optimization hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphState {
    /// Check structural invariants: finite poses, no self-edges, every edge
    /// endpoint in range, no duplicate edges.
    pub fn validate(&self) -> Result<()> {
        if let Some(i) = self.nodes.iter().position(|n| !n.pose.is_finite()) {
            return Err(RoadmapError::InvalidGraph(format!(
                "node {} has a non-finite pose",
                i
            )));
        }

        let n = self.nodes.len();
        let mut seen = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if edge.a == edge.b {
                return Err(RoadmapError::InvalidGraph(format!(
                    "self-edge on node {}",
                    edge.a
                )));
            }
            if edge.a >= n || edge.b >= n {
                return Err(RoadmapError::InvalidGraph(format!(
                    "edge ({}, {}) references a node outside 0..{}",
                    edge.a, edge.b, n
                )));
            }
            if !seen.insert(*edge) {
                return Err(RoadmapError::InvalidGraph(format!(
                    "duplicate edge ({}, {})",
                    edge.a, edge.b
                )));
            }
        }
        Ok(())
    }
}

/// The live topological map.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    config: SkeletonConfig,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    localization: Option<usize>,
    revision: u64,
}

impl Skeleton {
    pub fn new(config: SkeletonConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Index of the node the robot currently sits on; `None` while empty.
    pub fn localization(&self) -> Option<usize> {
        self.localization
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Commit counter, bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Append a keyframe node and chain it to the previous one.
    pub fn admit_keyframe(&mut self, event: &KeyframeEvent) -> Admission {
        let pose = self.config.projection.project(&event.pose);
        let index = self.nodes.len();

        self.nodes.push(Node {
            pose,
            timestamp_us: event.frame.timestamp_us,
            keyframe_id: Some(event.id),
        });

        let mut edges_added = 0;
        if index >= 1 {
            self.edges.push(Edge::new(index - 1, index));
            edges_added = 1;
        }

        self.localization = Some(index);
        self.revision += 1;

        log::debug!(
            "Keyframe {} admitted as node {} at ({:.3}, {:.3}, {:.3})",
            event.id,
            index,
            pose.x,
            pose.y,
            pose.theta
        );

        Admission::Admitted { index, edges_added }
    }

    /// Admit a localized pose if it differs enough from the last node.
    ///
    /// On admission the new node `i` is linked as `(i, j)` to every earlier
    /// node `j` closer than the proximity radius.
    pub fn admit_pose_sample(&mut self, sample: &PoseSample) -> Admission {
        let pose = sample.pose;

        if let Some(last) = self.nodes.last() {
            let moved = last.pose.distance(&pose);
            let turned = angle_diff(last.pose.theta, pose.theta).abs();
            if moved <= self.config.admit_distance && turned <= self.config.admit_angle {
                return Admission::Suppressed;
            }
        }

        let index = self.nodes.len();
        let before = self.edges.len();
        for (j, node) in self.nodes.iter().enumerate() {
            if node.pose.distance(&pose) < self.config.proximity_distance {
                self.edges.push(Edge::new(index, j));
            }
        }
        let edges_added = self.edges.len() - before;

        self.nodes.push(Node {
            pose,
            timestamp_us: sample.timestamp_us,
            keyframe_id: None,
        });
        self.localization = Some(index);
        self.revision += 1;

        log::debug!(
            "Pose sample admitted as node {} at ({:.3}, {:.3}, {:.3}), {} proximity edges",
            index,
            pose.x,
            pose.y,
            pose.theta,
            edges_added
        );

        Admission::Admitted { index, edges_added }
    }

    /// Consistent copy of the current graph.
    pub fn snapshot(&self, timestamp_us: u64) -> RoadmapSnapshot {
        RoadmapSnapshot {
            timestamp_us,
            nodes: self.nodes.iter().map(|n| n.pose).collect(),
            edges: self.edges.clone(),
            localization: self.localization,
            revision: self.revision,
        }
    }

    /// Export nodes and edges.
    pub fn graph_state(&self) -> GraphState {
        GraphState {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Replace the whole graph with validated content.
    ///
    /// Localization moves to the last node. On error nothing changes.
    pub fn replace(&mut self, state: GraphState) -> Result<()> {
        state.validate()?;
        self.localization = state.nodes.len().checked_sub(1);
        self.nodes = state.nodes;
        self.edges = state.edges;
        self.revision += 1;
        Ok(())
    }

    /// Load a persisted graph through `store`.
    pub fn load(&mut self, store: &dyn GraphStore, path: &Path) -> Result<()> {
        let state = store.load(path)?;
        self.replace(state)?;
        log::info!(
            "Loaded roadmap from {:?}: {} nodes, {} edges",
            path,
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    /// Persist the graph through `store`.
    pub fn save(&self, store: &dyn GraphStore, path: &Path) -> Result<()> {
        store.save(path, &self.graph_state())?;
        log::info!(
            "Saved roadmap to {:?}: {} nodes, {} edges",
            path,
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    /// Let `relaxer` adjust node poses.
    ///
    /// The result must keep node count and edge set unchanged and have
    /// finite poses; otherwise it is discarded and an error returned.
    pub fn optimize(&mut self, relaxer: &mut dyn PoseRelaxer) -> Result<()> {
        let current = self.graph_state();
        let relaxed = relaxer.relax(&current)?;

        if relaxed.nodes.len() != current.nodes.len() {
            return Err(RoadmapError::InvalidGraph(format!(
                "optimizer changed node count from {} to {}",
                current.nodes.len(),
                relaxed.nodes.len()
            )));
        }
        if relaxed.edges != current.edges {
            return Err(RoadmapError::InvalidGraph(
                "optimizer changed edge membership".to_string(),
            ));
        }
        relaxed.validate()?;

        for (node, relaxed) in self.nodes.iter_mut().zip(relaxed.nodes) {
            node.pose = relaxed.pose;
        }
        self.revision += 1;
        Ok(())
    }
}
