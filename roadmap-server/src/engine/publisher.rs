//! Roadmap publication policy.
//!
//! A snapshot goes out when:
//! - the server starts, before any sensor input is consumed
//! - the skeleton revision moved since the last publication
//! - nothing changed for a whole heartbeat window, so late subscribers
//!   still receive the map
//!
//! The revision check and the snapshot copy happen under one read guard.

use serde::{Deserialize, Serialize};

use super::snapshot::RoadmapSnapshot;
use crate::error::Result;
use crate::state::SharedSkeleton;
use crate::utils::secs_to_us;

/// Destination for roadmap snapshots.
pub trait RoadmapSink: Send {
    fn publish(&mut self, snapshot: &RoadmapSnapshot) -> Result<()>;

    /// Transport housekeeping on cycles where nothing is published,
    /// e.g. bringing newly connected subscribers up to date.
    fn poll(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: RoadmapSink + ?Sized> RoadmapSink for Box<S> {
    fn publish(&mut self, snapshot: &RoadmapSnapshot) -> Result<()> {
        (**self).publish(snapshot)
    }

    fn poll(&mut self) -> Result<()> {
        (**self).poll()
    }
}

/// Publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Republish unchanged content after this long (seconds).
    pub heartbeat_window_s: f64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            heartbeat_window_s: 5.0,
        }
    }
}

/// Why a snapshot was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReason {
    Initial,
    Changed,
    Heartbeat,
}

/// Decides when to publish and forwards snapshots to a sink.
pub struct RoadmapPublisher {
    sink: Box<dyn RoadmapSink>,
    heartbeat_window_us: u64,
    last_revision: Option<u64>,
    last_published_us: Option<u64>,
    published: u64,
}

impl RoadmapPublisher {
    pub fn new(sink: Box<dyn RoadmapSink>, config: &PublisherConfig) -> Self {
        Self {
            sink,
            heartbeat_window_us: secs_to_us(config.heartbeat_window_s),
            last_revision: None,
            last_published_us: None,
            published: 0,
        }
    }

    /// Number of snapshots published so far.
    pub fn published_count(&self) -> u64 {
        self.published
    }

    /// Publish the current state unconditionally.
    pub fn publish_initial(&mut self, skeleton: &SharedSkeleton, now_us: u64) -> Result<PublishReason> {
        let snapshot = skeleton.read()?.snapshot(now_us);
        self.send(&snapshot, PublishReason::Initial)?;
        Ok(PublishReason::Initial)
    }

    /// Publish if the skeleton changed or the heartbeat window elapsed.
    pub fn publish_if_due(
        &mut self,
        skeleton: &SharedSkeleton,
        now_us: u64,
    ) -> Result<Option<PublishReason>> {
        let due = {
            let skel = skeleton.read()?;
            let reason = if self.last_revision != Some(skel.revision()) {
                Some(PublishReason::Changed)
            } else if self.heartbeat_due(now_us) {
                Some(PublishReason::Heartbeat)
            } else {
                None
            };
            reason.map(|reason| (skel.snapshot(now_us), reason))
        };

        match due {
            Some((snapshot, reason)) => {
                self.send(&snapshot, reason)?;
                Ok(Some(reason))
            }
            None => {
                self.sink.poll()?;
                Ok(None)
            }
        }
    }

    fn heartbeat_due(&self, now_us: u64) -> bool {
        match self.last_published_us {
            Some(last) => now_us.saturating_sub(last) >= self.heartbeat_window_us,
            None => true,
        }
    }

    fn send(&mut self, snapshot: &RoadmapSnapshot, reason: PublishReason) -> Result<()> {
        self.sink.publish(snapshot)?;
        self.last_revision = Some(snapshot.revision);
        self.last_published_us = Some(snapshot.timestamp_us);
        self.published += 1;

        log::debug!(
            "Published roadmap ({:?}): {} nodes, {} edges",
            reason,
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        Ok(())
    }
}
