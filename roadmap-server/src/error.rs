//! Error types for the roadmap server

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, RoadmapError>;

/// Roadmap server error types
#[derive(Error, Debug)]
pub enum RoadmapError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed wire message
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid or unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted graph could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Graph state violates the skeleton invariants
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// Odometry boundary failed to process a frame
    #[error("Odometry error: {0}")]
    Odometry(String),

    /// Publishing transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// A thread panicked while holding the skeleton lock
    #[error("Skeleton lock poisoned")]
    LockPoisoned,
}

impl From<prost::DecodeError> for RoadmapError {
    fn from(e: prost::DecodeError) -> Self {
        RoadmapError::Decode(e.to_string())
    }
}

impl From<basic_toml::Error> for RoadmapError {
    fn from(e: basic_toml::Error) -> Self {
        RoadmapError::Config(e.to_string())
    }
}

impl From<serde_yaml::Error> for RoadmapError {
    fn from(e: serde_yaml::Error) -> Self {
        RoadmapError::Persistence(e.to_string())
    }
}
