//! Thread-safe handle to the live skeleton.
//!
//! The server thread is the only writer. Publishers and any diagnostic
//! readers take a read guard, so a snapshot always sees one committed
//! revision.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::engine::{Skeleton, SkeletonConfig};
use crate::error::{Result, RoadmapError};

/// Shared skeleton wrapped in `Arc<RwLock>`.
#[derive(Debug, Clone, Default)]
pub struct SharedSkeleton(Arc<RwLock<Skeleton>>);

impl SharedSkeleton {
    pub fn new(skeleton: Skeleton) -> Self {
        Self(Arc::new(RwLock::new(skeleton)))
    }

    /// Acquire a read guard.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Skeleton>> {
        self.0.read().map_err(|_| RoadmapError::LockPoisoned)
    }

    /// Acquire the write guard. Each admission, load or optimize should run
    /// under a single guard.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Skeleton>> {
        self.0.write().map_err(|_| RoadmapError::LockPoisoned)
    }
}

/// Create a new empty shared skeleton.
pub fn create_shared_skeleton(config: SkeletonConfig) -> SharedSkeleton {
    SharedSkeleton::new(Skeleton::new(config))
}
