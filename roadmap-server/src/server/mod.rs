//! Roadmap server: adapter → (odometer) → skeleton → publisher.
//!
//! The ingestion mode is fixed at construction:
//!
//! - **Keyframe**: stereo frames go through the odometry boundary; every
//!   keyframe becomes a node chained to the previous one.
//! - **Threshold**: localized poses are admitted directly when they moved or
//!   turned far enough, and linked to nearby nodes.
//!
//! Messages of the other kind are counted and ignored. After each message
//! (and on every idle poll) the publisher decides whether a snapshot is due.

mod thread;

pub use thread::ServerThread;

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};

use crate::engine::{PublishReason, PublisherConfig, RoadmapPublisher, RoadmapSink};
use crate::error::{Result, RoadmapError};
use crate::odometry::{OdometryEvent, Odometer};
use crate::sensors::{AdaptedInput, AdapterStats, FrameAdapter, SensorMessage};
use crate::state::SharedSkeleton;
use crate::utils::now_us;

/// Which admission path the server uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Stereo frames → odometry keyframes → chained nodes.
    Keyframe,
    /// Localized poses → distance/heading thresholds → proximity-linked nodes.
    #[default]
    Threshold,
}

impl FromStr for ModeKind {
    type Err = RoadmapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyframe" => Ok(ModeKind::Keyframe),
            "threshold" => Ok(ModeKind::Threshold),
            other => Err(RoadmapError::Config(format!(
                "unknown mode '{}', expected 'keyframe' or 'threshold'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeKind::Keyframe => write!(f, "keyframe"),
            ModeKind::Threshold => write!(f, "threshold"),
        }
    }
}

/// Server loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub mode: ModeKind,
    /// How long to wait for a message before an idle heartbeat check (ms).
    pub poll_interval_ms: u64,
    /// Capacity of the sensor channel.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ModeKind::default(),
            poll_interval_ms: 100,
            channel_capacity: 4,
        }
    }
}

/// Ingestion mode with its collaborators.
pub enum IngestionMode {
    Keyframe(Box<dyn Odometer>),
    Threshold,
}

impl IngestionMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            IngestionMode::Keyframe(_) => ModeKind::Keyframe,
            IngestionMode::Threshold => ModeKind::Threshold,
        }
    }
}

/// Per-server counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub messages: u64,
    /// Valid input of the wrong kind for the mode.
    pub ignored: u64,
    pub keyframes: u64,
    pub odometry_lost: u64,
    pub odometry_errors: u64,
    pub admitted: u64,
    pub suppressed: u64,
    pub publish_errors: u64,
}

/// Single-writer roadmap server.
pub struct RoadmapServer {
    mode: IngestionMode,
    adapter: FrameAdapter,
    skeleton: SharedSkeleton,
    publisher: RoadmapPublisher,
    poll_interval: Duration,
    stats: ServerStats,
}

impl RoadmapServer {
    pub fn new(
        config: &ServerConfig,
        publisher_config: &PublisherConfig,
        mode: IngestionMode,
        skeleton: SharedSkeleton,
        sink: Box<dyn RoadmapSink>,
    ) -> Self {
        Self {
            mode,
            adapter: FrameAdapter::new(),
            skeleton,
            publisher: RoadmapPublisher::new(sink, publisher_config),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            stats: ServerStats::default(),
        }
    }

    pub fn mode(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn skeleton(&self) -> &SharedSkeleton {
        &self.skeleton
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    pub fn adapter_stats(&self) -> Arc<AdapterStats> {
        self.adapter.stats()
    }

    /// Publish the initial snapshot, then subscribe to sensor input.
    ///
    /// Subscribers always see the current (possibly empty or loaded) map
    /// before the first message is processed.
    pub fn start<F>(&mut self, now_us: u64, subscribe: F) -> Result<Receiver<SensorMessage>>
    where
        F: FnOnce() -> Result<Receiver<SensorMessage>>,
    {
        self.publisher.publish_initial(&self.skeleton, now_us)?;
        log::info!("Roadmap server started in {} mode", self.mode.kind());
        subscribe()
    }

    /// Handle one message and publish if due.
    pub fn process(&mut self, message: SensorMessage, now_us: u64) -> Result<Option<PublishReason>> {
        self.stats.messages += 1;

        if let Some(input) = self.adapter.adapt(message) {
            self.ingest(input)?;
        }

        self.publish_due(now_us)
    }

    /// Idle heartbeat check.
    pub fn tick(&mut self, now_us: u64) -> Result<Option<PublishReason>> {
        self.publish_due(now_us)
    }

    /// Serve until `running` clears or the sensor channel closes.
    pub fn run(&mut self, receiver: Receiver<SensorMessage>, running: Arc<AtomicBool>) -> Result<()> {
        while running.load(Ordering::Relaxed) {
            let result = match receiver.recv_timeout(self.poll_interval) {
                Ok(message) => self.process(message, now_us()),
                Err(RecvTimeoutError::Timeout) => self.tick(now_us()),
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("Sensor channel closed");
                    break;
                }
            };

            match result {
                Ok(_) => {}
                Err(RoadmapError::LockPoisoned) => return Err(RoadmapError::LockPoisoned),
                Err(e) => log::warn!("Roadmap server cycle failed: {}", e),
            }
        }

        let counts = self.adapter.stats().counts();
        log::info!(
            "Roadmap server stopped: {} messages, {} admitted, {} suppressed, {} dropped, {} ignored",
            self.stats.messages,
            self.stats.admitted,
            self.stats.suppressed,
            counts.dropped(),
            self.stats.ignored
        );
        Ok(())
    }

    fn ingest(&mut self, input: AdaptedInput) -> Result<()> {
        match (&mut self.mode, input) {
            (IngestionMode::Keyframe(odometer), AdaptedInput::Frame(frame)) => {
                match odometer.handle_frame(frame) {
                    Ok(OdometryEvent::Keyframe(event)) => {
                        self.stats.keyframes += 1;
                        self.skeleton.write()?.admit_keyframe(&event);
                        self.stats.admitted += 1;
                    }
                    Ok(OdometryEvent::Tracking { .. }) => {}
                    Ok(OdometryEvent::Lost) => {
                        self.stats.odometry_lost += 1;
                        log::debug!("Odometry lost, frame skipped");
                    }
                    Err(e) => {
                        self.stats.odometry_errors += 1;
                        log::warn!("Odometry failed, frame skipped: {}", e);
                    }
                }
            }
            (IngestionMode::Threshold, AdaptedInput::Sample(sample)) => {
                let admission = self.skeleton.write()?.admit_pose_sample(&sample);
                if admission.changed() {
                    self.stats.admitted += 1;
                } else {
                    self.stats.suppressed += 1;
                }
            }
            (mode, input) => {
                self.stats.ignored += 1;
                let kind = match input {
                    AdaptedInput::Frame(_) => "stereo frame",
                    AdaptedInput::Sample(_) => "pose sample",
                };
                log::debug!("Ignoring {} in {} mode", kind, mode.kind());
            }
        }
        Ok(())
    }

    fn publish_due(&mut self, now_us: u64) -> Result<Option<PublishReason>> {
        match self.publisher.publish_if_due(&self.skeleton, now_us) {
            Ok(reason) => Ok(reason),
            Err(RoadmapError::LockPoisoned) => Err(RoadmapError::LockPoisoned),
            Err(e) => {
                self.stats.publish_errors += 1;
                Err(e)
            }
        }
    }
}
