//! In-process roadmap sink.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::engine::{RoadmapSink, RoadmapSnapshot};
use crate::error::{Result, RoadmapError};

/// Forwards snapshots over a bounded crossbeam channel.
///
/// When the consumer falls behind, new snapshots are dropped; the next
/// change or heartbeat carries the full map again.
pub struct ChannelSink {
    tx: Sender<RoadmapSnapshot>,
}

impl ChannelSink {
    /// Create a sink and the receiving end.
    pub fn new(capacity: usize) -> (Self, Receiver<RoadmapSnapshot>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl RoadmapSink for ChannelSink {
    fn publish(&mut self, snapshot: &RoadmapSnapshot) -> Result<()> {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                log::debug!("Roadmap channel full, snapshot dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(RoadmapError::Transport(
                "roadmap channel receiver dropped".to_string(),
            )),
        }
    }
}
