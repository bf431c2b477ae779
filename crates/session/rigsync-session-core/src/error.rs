use thiserror::Error;

use rigsync_api_core::NodeId;
use rigsync_binding_core::BindingError;
use rigsync_pose_core::PoseError;
use rigsync_rig_core::RigError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Pose(#[from] PoseError),
    #[error(transparent)]
    Rig(#[from] RigError),
    #[error("no pose overrider container on node {0:?}")]
    UnknownPoseContainer(NodeId),
}
