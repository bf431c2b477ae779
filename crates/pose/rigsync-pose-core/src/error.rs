use rigsync_api_core::NodeId;
use thiserror::Error;

/// Invalid overrider containers, rejected before they reach a handler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoseError {
    #[error("overrider {overrider} of container {node:?}: magnitude {magnitude} must be finite and non-negative")]
    InvalidMagnitude {
        node: NodeId,
        overrider: usize,
        magnitude: f32,
    },
    #[error("overrider {overrider} of container {node:?}: direction must be a finite non-zero vector")]
    InvalidDirection { node: NodeId, overrider: usize },
    #[error("overrider {overrider} of container {node:?}: non-finite value in '{field}'")]
    NonFinite {
        node: NodeId,
        overrider: usize,
        field: &'static str,
    },
    #[error("overrider {overrider} of container {node:?}: minimum duration {min} exceeds maximum {max}")]
    InvalidDuration {
        node: NodeId,
        overrider: usize,
        min: f32,
        max: f32,
    },
}
