//! Pose conditions.
//!
//! Each condition is a predicate over the local skeleton and the scene. A condition whose
//! target cannot be resolved evaluates to `false`.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use rigsync_api_core::math::{distance3, dot3, normalize3, sub3};
use rigsync_api_core::{BoneType, NodeId, Transform};

use crate::error::PoseError;

/// What conditions read from.
pub trait PoseEnvironment {
    /// World position of a bone of the skeleton the overriders apply to.
    fn bone_position(&self, bone: BoneType) -> Option<[f32; 3]>;
    fn node_transform(&self, node: NodeId) -> Option<Transform>;
    /// Whether the interactable is currently engaged by the local user.
    fn is_engaged(&self, interactable: NodeId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PoseCondition {
    /// Bone within `magnitude` of the target's position.
    Magnitude {
        #[serde(rename = "boneOrigin")]
        bone_origin: BoneType,
        #[serde(rename = "targetObjectId")]
        target_object_id: NodeId,
        magnitude: f32,
    },
    /// Bone-to-target direction aligned with `direction`: the cosine between them is at
    /// least `threshold`.
    Direction {
        #[serde(rename = "boneOrigin")]
        bone_origin: BoneType,
        #[serde(rename = "targetObjectId")]
        target_object_id: NodeId,
        direction: [f32; 3],
        #[serde(default)]
        threshold: f32,
    },
    /// Target scale at most `target_scale` on every axis.
    Scale {
        #[serde(rename = "targetObjectId")]
        target_object_id: NodeId,
        #[serde(rename = "targetScale")]
        target_scale: [f32; 3],
    },
    /// The interactable is engaged.
    Projected {
        #[serde(rename = "interactableId")]
        interactable_id: NodeId,
    },
    Not {
        condition: Box<PoseCondition>,
    },
    Or {
        conditions: Vec<PoseCondition>,
    },
}

impl PoseCondition {
    pub fn evaluate(&self, env: &dyn PoseEnvironment) -> bool {
        match self {
            PoseCondition::Magnitude {
                bone_origin,
                target_object_id,
                magnitude,
            } => {
                let (Some(bone), Some(target)) = (
                    env.bone_position(*bone_origin),
                    env.node_transform(*target_object_id),
                ) else {
                    return false;
                };
                distance3(bone, target.translation) <= *magnitude
            }
            PoseCondition::Direction {
                bone_origin,
                target_object_id,
                direction,
                threshold,
            } => {
                let (Some(bone), Some(target)) = (
                    env.bone_position(*bone_origin),
                    env.node_transform(*target_object_id),
                ) else {
                    return false;
                };
                match (normalize3(sub3(target.translation, bone)), normalize3(*direction)) {
                    (Some(to_target), Some(dir)) => dot3(to_target, dir) >= *threshold,
                    _ => false,
                }
            }
            PoseCondition::Scale {
                target_object_id,
                target_scale,
            } => match env.node_transform(*target_object_id) {
                Some(t) => (0..3).all(|i| t.scale[i] <= target_scale[i]),
                None => false,
            },
            PoseCondition::Projected { interactable_id } => env.is_engaged(*interactable_id),
            PoseCondition::Not { condition } => !condition.evaluate(env),
            PoseCondition::Or { conditions } => conditions.iter().any(|c| c.evaluate(env)),
        }
    }

    /// Whether the condition depends on an interaction signal anywhere in its tree.
    pub fn requires_interaction(&self) -> bool {
        match self {
            PoseCondition::Projected { .. } => true,
            PoseCondition::Not { condition } => condition.requires_interaction(),
            PoseCondition::Or { conditions } => conditions.iter().any(Self::requires_interaction),
            PoseCondition::Magnitude { .. }
            | PoseCondition::Direction { .. }
            | PoseCondition::Scale { .. } => false,
        }
    }

    pub(crate) fn validate(&self, node: NodeId, overrider: usize) -> Result<(), PoseError> {
        let non_finite = |field| PoseError::NonFinite {
            node,
            overrider,
            field,
        };
        match self {
            PoseCondition::Magnitude { magnitude, .. } => {
                if !magnitude.is_finite() || *magnitude < 0.0 {
                    return Err(PoseError::InvalidMagnitude {
                        node,
                        overrider,
                        magnitude: *magnitude,
                    });
                }
            }
            PoseCondition::Direction {
                direction,
                threshold,
                ..
            } => {
                if normalize3(*direction).is_none() {
                    return Err(PoseError::InvalidDirection { node, overrider });
                }
                if !threshold.is_finite() {
                    return Err(non_finite("threshold"));
                }
            }
            PoseCondition::Scale { target_scale, .. } => {
                if !target_scale.iter().all(|c| c.is_finite()) {
                    return Err(non_finite("targetScale"));
                }
            }
            PoseCondition::Projected { .. } => {}
            PoseCondition::Not { condition } => condition.validate(node, overrider)?,
            PoseCondition::Or { conditions } => {
                for c in conditions {
                    c.validate(node, overrider)?;
                }
            }
        }
        Ok(())
    }
}

/// In-memory [`PoseEnvironment`].
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    pub bones: HashMap<BoneType, [f32; 3]>,
    pub nodes: HashMap<NodeId, Transform>,
    pub engaged: HashSet<NodeId>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bone(mut self, bone: BoneType, position: [f32; 3]) -> Self {
        self.bones.insert(bone, position);
        self
    }

    pub fn with_node(mut self, node: NodeId, transform: Transform) -> Self {
        self.nodes.insert(node, transform);
        self
    }
}

impl PoseEnvironment for StaticEnvironment {
    fn bone_position(&self, bone: BoneType) -> Option<[f32; 3]> {
        self.bones.get(&bone).copied()
    }

    fn node_transform(&self, node: NodeId) -> Option<Transform> {
        self.nodes.get(&node).copied()
    }

    fn is_engaged(&self, interactable: NodeId) -> bool {
        self.engaged.contains(&interactable)
    }
}
