//! Pose relaxation hook.
//!
//! Graph optimization itself lives outside this crate. A [`PoseRelaxer`]
//! receives the current graph and returns adjusted poses; the skeleton
//! rejects any result that alters its structure.

use super::skeleton::GraphState;
use crate::error::Result;

/// Optimization collaborator.
pub trait PoseRelaxer {
    /// Return `state` with adjusted node poses. Node count and edges must
    /// be preserved.
    fn relax(&mut self, state: &GraphState) -> Result<GraphState>;
}

/// Relaxer that leaves every pose where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRelaxer;

impl PoseRelaxer for NoopRelaxer {
    fn relax(&mut self, state: &GraphState) -> Result<GraphState> {
        Ok(state.clone())
    }
}
