//! rigsync-rig-core
//!
//! Retargeting building blocks:
//! - [`link`]: pure link-primitive graphs producing a (position, rotation) per link
//! - [`mapping`]: bone-type to link bindings evaluated against a tracked skeleton
//! - [`hierarchy`]: parent/rest-offset relations of the standard bone taxonomy

pub mod error;
pub mod hierarchy;
pub mod link;
pub mod mapping;

pub use error::RigError;
pub use hierarchy::{BoneRelation, BoneRelationSpec, Hierarchy};
pub use link::{LinkGraph, LinkId, LinkKind, LinkSpec, PoseSource, SourceKey};
pub use mapping::{MapperSpec, SkeletonMapper, SkeletonMapping};
pub use rigsync_api_core::{BoneType, Pose};
