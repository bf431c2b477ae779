//! rigsync-pose-core
//!
//! Decides which canned pose a skeleton should play:
//! - [`condition`]: kinematic and interaction predicates over a [`PoseEnvironment`]
//! - [`overrider`]: overriders (pose + conditions + trigger kind) grouped per scene node
//! - [`handler`]: the per-container Idle / Armed / Playing state machine
//! - [`set`]: one handler per container node for a skeleton

pub mod condition;
pub mod error;
pub mod handler;
pub mod overrider;
pub mod set;

pub use condition::{PoseCondition, PoseEnvironment, StaticEnvironment};
pub use error::PoseError;
pub use handler::{HandlerConfig, HandlerState, PoseEvent, PoseOverriderHandler, PosePlayback};
pub use overrider::{OverriderKind, PoseDuration, PoseId, PoseOverrider, PoseOverriderContainer};
pub use set::PoseOverriderSet;
