//! rigsync-binding-core
//!
//! Bindings derive a bound node's transform from another node, a remote user's bone, or a
//! rig slot under the node. This crate holds:
//! - [`model`]: immutable binding values built from the wire DTOs in [`wire`]
//! - [`registry`]: the bound-node → ordered bindings index
//! - [`resolve`]: the scene / skeleton access traits the evaluator reads through
//! - [`evaluator`]: the per-tick composition (priority, partial fit, channel masks)

pub mod error;
pub mod evaluator;
pub mod model;
pub mod registry;
pub mod resolve;
pub mod wire;

pub use error::BindingError;
pub use evaluator::{BindingEvaluator, ResolutionFailure, TickReport, TransformWrite};
pub use model::{Binding, BindingParams, BindingSource, Channel, MultiBinding, OffsetSpace, SimpleBinding};
pub use registry::{BindingRegistry, RegisteredBinding};
pub use resolve::{BoneSource, SceneAccess, SkeletonPoses};
pub use wire::{BindingDataDto, BindingDto, CommonBindingData};
