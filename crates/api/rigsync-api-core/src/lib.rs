//! rigsync-api-core: ids, vector/quaternion math, transforms and the in-memory scene tree
//! shared by the rig, binding, pose and session crates.

pub mod ids;
pub mod math;
pub mod scene;
pub mod transform;

pub use ids::{BindingId, BoneType, NodeId, UserId};
pub use scene::{Scene, SceneError, SceneNode};
pub use transform::{Pose, Transform};
