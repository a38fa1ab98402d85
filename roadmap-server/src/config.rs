//! Daemon configuration.
//!
//! Loaded from TOML; every section and field has a default, so an empty file
//! (or no file at all) yields a runnable threshold-mode server.
//!
//! ```toml
//! [source]
//! address = "127.0.0.1:5570"
//!
//! [output]
//! bind_port = 5560
//!
//! [server]
//! mode = "threshold"        # or "keyframe"
//! poll_interval_ms = 100
//! channel_capacity = 4
//!
//! [skeleton]
//! admit_distance = 1.0      # meters
//! admit_angle = 0.0349      # radians (2°)
//! proximity_distance = 1.5  # meters
//! projection = "camera"     # or "ground"
//!
//! [publisher]
//! heartbeat_window_s = 5.0
//!
//! [odometry]
//! script = "trajectory.yaml"
//!
//! [persistence]
//! load = "roadmap.yaml"
//! save = "roadmap.yaml"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::{PublisherConfig, SkeletonConfig};
use crate::error::{Result, RoadmapError};
use crate::io::source::ReceiverConfig;
use crate::odometry::VisualOdometerConfig;
use crate::server::{ModeKind, ServerConfig};

/// Files tried when no `--config` is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &["roadmap-server.toml", "/etc/roadmap-server.toml"];

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoadmapConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub skeleton: SkeletonConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub odometry: OdometryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Sensor/pose source, `"host:port"`.
    pub address: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5570".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// TCP port roadmap clients connect to.
    pub bind_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { bind_port: 5560 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    /// YAML odometry script driving keyframe mode.
    pub script: Option<PathBuf>,
    pub position_keyframe_thresh: f64,
    pub angle_keyframe_thresh: f64,
    pub inlier_thresh: usize,
    pub min_inliers: usize,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        let vo = VisualOdometerConfig::default();
        Self {
            script: None,
            position_keyframe_thresh: vo.position_keyframe_thresh,
            angle_keyframe_thresh: vo.angle_keyframe_thresh,
            inlier_thresh: vo.inlier_thresh,
            min_inliers: vo.min_inliers,
        }
    }
}

impl OdometryConfig {
    /// Visual odometer settings numbering frames from `first_frame_id`.
    pub fn visual_config(&self, first_frame_id: u64) -> VisualOdometerConfig {
        VisualOdometerConfig {
            position_keyframe_thresh: self.position_keyframe_thresh,
            angle_keyframe_thresh: self.angle_keyframe_thresh,
            inlier_thresh: self.inlier_thresh,
            min_inliers: self.min_inliers,
            first_frame_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Graph to load at startup. Failure to load is fatal.
    pub load: Option<PathBuf>,
    /// Where to save the graph on shutdown.
    pub save: Option<PathBuf>,
}

impl RoadmapConfig {
    /// Parse a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(basic_toml::from_str(contents)?)
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| RoadmapError::Config(format!("failed to read {:?}: {}", path, e)))?;
        Self::from_toml(&contents)
    }

    /// Load `path`, or the first default location that parses. Problems are
    /// logged and defaults used.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load(path) {
                Ok(cfg) => {
                    log::info!("Loaded config from {:?}", path);
                    cfg
                }
                Err(e) => {
                    log::warn!("{}; using defaults", e);
                    Self::default()
                }
            },
            None => {
                for candidate in DEFAULT_CONFIG_PATHS {
                    if let Ok(contents) = fs::read_to_string(candidate)
                        && let Ok(cfg) = Self::from_toml(&contents)
                    {
                        log::info!("Loaded config from {}", candidate);
                        return cfg;
                    }
                }
                Self::default()
            }
        }
    }

    /// Receiver settings for the sensor source.
    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            address: self.source.address.clone(),
            channel_capacity: self.server.channel_capacity,
            ..Default::default()
        }
    }

    /// Check values once, before anything is constructed.
    pub fn validate(&self) -> Result<()> {
        let sk = &self.skeleton;
        non_negative("skeleton.admit_distance", sk.admit_distance)?;
        non_negative("skeleton.admit_angle", sk.admit_angle)?;
        positive("skeleton.proximity_distance", sk.proximity_distance)?;
        positive("publisher.heartbeat_window_s", self.publisher.heartbeat_window_s)?;

        if self.server.poll_interval_ms == 0 {
            return Err(RoadmapError::Config(
                "server.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.server.channel_capacity == 0 {
            return Err(RoadmapError::Config(
                "server.channel_capacity must be > 0".to_string(),
            ));
        }
        if self.source.address.trim().is_empty() {
            return Err(RoadmapError::Config("source.address is empty".to_string()));
        }

        if self.server.mode == ModeKind::Keyframe {
            if self.odometry.script.is_none() {
                return Err(RoadmapError::Config(
                    "keyframe mode needs odometry.script".to_string(),
                ));
            }
            positive(
                "odometry.position_keyframe_thresh",
                self.odometry.position_keyframe_thresh,
            )?;
            positive(
                "odometry.angle_keyframe_thresh",
                self.odometry.angle_keyframe_thresh,
            )?;
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RoadmapError::Config(format!("{} must be > 0, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RoadmapError::Config(format!("{} must be >= 0, got {}", name, value)))
    }
}
