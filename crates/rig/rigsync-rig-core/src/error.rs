use rigsync_api_core::{BoneType, SceneError};
use thiserror::Error;

use crate::link::LinkId;

/// Configuration errors raised while building link graphs, mappers and hierarchies.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RigError {
    #[error("duplicate link id '{0}'")]
    DuplicateLink(LinkId),
    #[error("link '{link}' references unknown link '{child}'")]
    UnknownLink { link: LinkId, child: LinkId },
    #[error("cycle detected in link graph at '{0}'")]
    LinkCycle(LinkId),
    #[error("link '{link}' has blend factor {factor} outside [0, 1]")]
    InvalidFactor { link: LinkId, factor: f32 },
    #[error("link '{0}' has a zero-length direction")]
    ZeroDirection(LinkId),
    #[error("link '{0}' has an empty source key")]
    EmptySource(LinkId),
    #[error("bone {0:?} is mapped more than once")]
    DuplicateMapping(BoneType),
    #[error("mapping for bone {bone:?} references unknown link '{link}'")]
    UnknownMappingLink { bone: BoneType, link: LinkId },
    #[error("hierarchy has no root bone")]
    NoRoot,
    #[error("hierarchy has several root bones: {0:?}")]
    MultipleRoots(Vec<BoneType>),
    #[error("bone {bone:?} declares undeclared parent {parent:?}")]
    UnknownParent { bone: BoneType, parent: BoneType },
    #[error("bone {0:?} cannot be the 'none' sentinel")]
    SentinelBone(BoneType),
    #[error("bone relation cycle through {0:?}")]
    BoneCycle(BoneType),
    #[error(transparent)]
    Scene(#[from] SceneError),
}
