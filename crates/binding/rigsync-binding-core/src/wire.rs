//! Binding messages as they arrive over the network, and their conversion into
//! [`Binding`] values.

use serde::{Deserialize, Serialize};

use rigsync_api_core::math::{normalize_quat, quat_dot, QUAT_IDENTITY, VEC3_ONE};
use rigsync_api_core::{BindingId, BoneType, NodeId, UserId};

use crate::error::BindingError;
use crate::model::{Binding, BindingParams, BindingSource, MultiBinding, OffsetSpace, SimpleBinding};

/// One add-binding message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDto {
    pub id: BindingId,
    pub bound_node_id: NodeId,
    pub data: BindingDataDto,
}

fn yes() -> bool {
    true
}

fn identity_quat() -> [f32; 4] {
    QUAT_IDENTITY
}

fn unit_scale() -> [f32; 3] {
    VEC3_ONE
}

/// Fields common to every binding message. Missing fields take the binding defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonBindingData {
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub partial_fit: bool,
    #[serde(default = "yes")]
    pub sync_position: bool,
    #[serde(default = "yes")]
    pub sync_rotation: bool,
    #[serde(default)]
    pub sync_scale: bool,
    #[serde(default)]
    pub offset_position: [f32; 3],
    #[serde(default = "identity_quat")]
    pub offset_rotation: [f32; 4],
    #[serde(default = "unit_scale")]
    pub offset_scale: [f32; 3],
    #[serde(default)]
    pub anchor_position: [f32; 3],
    #[serde(default)]
    pub offset_space: OffsetSpace,
    #[serde(default)]
    pub reset_when_removed: bool,
}

impl Default for CommonBindingData {
    fn default() -> Self {
        let p = BindingParams::default();
        Self {
            priority: p.priority,
            partial_fit: p.partial_fit,
            sync_position: p.sync_position,
            sync_rotation: p.sync_rotation,
            sync_scale: p.sync_scale,
            offset_position: p.offset_position,
            offset_rotation: p.offset_rotation,
            offset_scale: p.offset_scale,
            anchor_position: p.anchor_position,
            offset_space: p.offset_space,
            reset_when_removed: p.reset_when_removed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BindingDataDto {
    NodeBindingData {
        #[serde(flatten)]
        common: CommonBindingData,
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    BoneBindingData {
        #[serde(flatten)]
        common: CommonBindingData,
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "boneType")]
        bone_type: BoneType,
        #[serde(rename = "bindToController", default)]
        bind_to_controller: bool,
    },
    RigBoneBindingData {
        #[serde(flatten)]
        common: CommonBindingData,
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "boneType")]
        bone_type: BoneType,
        #[serde(rename = "bindToController", default)]
        bind_to_controller: bool,
        #[serde(rename = "rigName")]
        rig_name: String,
    },
    MultiBindingData {
        #[serde(flatten)]
        common: CommonBindingData,
        children: Vec<BindingDataDto>,
    },
}

fn finite<const N: usize>(v: &[f32; N], field: &'static str) -> Result<(), BindingError> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(BindingError::NonFinite(field))
    }
}

impl TryFrom<&CommonBindingData> for BindingParams {
    type Error = BindingError;

    fn try_from(c: &CommonBindingData) -> Result<Self, Self::Error> {
        finite(&c.offset_position, "offsetPosition")?;
        finite(&c.offset_scale, "offsetScale")?;
        finite(&c.anchor_position, "anchorPosition")?;
        let q = c.offset_rotation;
        let norm = quat_dot(q, q);
        if !norm.is_finite() || norm <= f32::EPSILON {
            return Err(BindingError::InvalidRotation(q));
        }
        Ok(BindingParams {
            priority: c.priority,
            partial_fit: c.partial_fit,
            sync_position: c.sync_position,
            sync_rotation: c.sync_rotation,
            sync_scale: c.sync_scale,
            offset_position: c.offset_position,
            offset_rotation: normalize_quat(q),
            offset_scale: c.offset_scale,
            anchor_position: c.anchor_position,
            offset_space: c.offset_space,
            reset_when_removed: c.reset_when_removed,
        })
    }
}

impl TryFrom<BindingDataDto> for SimpleBinding {
    type Error = BindingError;

    fn try_from(dto: BindingDataDto) -> Result<Self, Self::Error> {
        match dto {
            BindingDataDto::NodeBindingData { common, node_id } => Ok(SimpleBinding {
                params: BindingParams::try_from(&common)?,
                source: BindingSource::Node { source: node_id },
            }),
            BindingDataDto::BoneBindingData {
                common,
                user_id,
                bone_type,
                bind_to_controller,
            } => Ok(SimpleBinding {
                params: BindingParams::try_from(&common)?,
                source: BindingSource::Bone {
                    user: user_id,
                    bone: bone_type,
                    bind_to_controller,
                },
            }),
            BindingDataDto::RigBoneBindingData {
                common,
                user_id,
                bone_type,
                bind_to_controller,
                rig_name,
            } => {
                if rig_name.trim().is_empty() {
                    return Err(BindingError::EmptyRigName);
                }
                Ok(SimpleBinding {
                    params: BindingParams::try_from(&common)?,
                    source: BindingSource::RigBone {
                        user: user_id,
                        bone: bone_type,
                        bind_to_controller,
                        rig_name,
                    },
                })
            }
            BindingDataDto::MultiBindingData { .. } => Err(BindingError::NestedMultiBinding),
        }
    }
}

impl TryFrom<BindingDataDto> for Binding {
    type Error = BindingError;

    fn try_from(dto: BindingDataDto) -> Result<Self, Self::Error> {
        match dto {
            BindingDataDto::MultiBindingData { common, children } => {
                if children.is_empty() {
                    return Err(BindingError::EmptyMultiBinding);
                }
                let params = BindingParams::try_from(&common)?;
                let children = children
                    .into_iter()
                    .map(SimpleBinding::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                MultiBinding::new(params, children).map(Binding::Multi)
            }
            other => SimpleBinding::try_from(other).map(Binding::Simple),
        }
    }
}
