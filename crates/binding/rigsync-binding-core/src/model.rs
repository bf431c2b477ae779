//! Immutable binding values.
//!
//! A binding is built once from its wire message (see [`crate::wire`]) and never mutated
//! afterwards; replacing a binding means registering a new value under the same id.

use serde::{Deserialize, Serialize};

use rigsync_api_core::math::{QUAT_IDENTITY, VEC3_ONE, VEC3_ZERO};
use rigsync_api_core::{BoneType, NodeId, UserId};

use crate::error::BindingError;

/// Transform channel a binding may synchronize.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Position,
    Rotation,
    Scale,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Position, Channel::Rotation, Channel::Scale];
}

/// Frame in which `offset_position` is added to the source position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetSpace {
    /// In the source's frame: scaled and rotated by the source transform.
    #[default]
    Local,
    World,
}

/// Fields shared by every binding kind.
#[derive(Clone, Debug, PartialEq)]
pub struct BindingParams {
    /// Higher priorities are applied first.
    pub priority: i32,
    /// Lets lower-priority bindings fill the channels this one leaves unsynced.
    pub partial_fit: bool,
    pub sync_position: bool,
    pub sync_rotation: bool,
    pub sync_scale: bool,
    pub offset_position: [f32; 3],
    pub offset_rotation: [f32; 4],
    pub offset_scale: [f32; 3],
    /// Point in the bound node's local frame placed at the computed position.
    pub anchor_position: [f32; 3],
    pub offset_space: OffsetSpace,
    /// Restore the node's pre-binding local transform once its last binding is removed.
    pub reset_when_removed: bool,
}

impl Default for BindingParams {
    fn default() -> Self {
        Self {
            priority: 0,
            partial_fit: false,
            sync_position: true,
            sync_rotation: true,
            sync_scale: false,
            offset_position: VEC3_ZERO,
            offset_rotation: QUAT_IDENTITY,
            offset_scale: VEC3_ONE,
            anchor_position: VEC3_ZERO,
            offset_space: OffsetSpace::Local,
            reset_when_removed: false,
        }
    }
}

impl BindingParams {
    #[inline]
    pub fn syncs(&self, channel: Channel) -> bool {
        match channel {
            Channel::Position => self.sync_position,
            Channel::Rotation => self.sync_rotation,
            Channel::Scale => self.sync_scale,
        }
    }

    /// No position, rotation or scale offset and no anchor.
    pub fn has_identity_offsets(&self) -> bool {
        self.offset_position == VEC3_ZERO
            && self.offset_rotation == QUAT_IDENTITY
            && self.offset_scale == VEC3_ONE
            && self.anchor_position == VEC3_ZERO
    }
}

/// Where a simple binding reads its transform from.
#[derive(Clone, Debug, PartialEq)]
pub enum BindingSource {
    /// World transform of another scene node.
    Node { source: NodeId },
    /// A bone of a user's skeleton, or that bone's raw controller pose.
    Bone {
        user: UserId,
        bone: BoneType,
        bind_to_controller: bool,
    },
    /// Like [`BindingSource::Bone`], but drives the rig named `rig_name` under the bound
    /// node instead of the bound node itself.
    RigBone {
        user: UserId,
        bone: BoneType,
        bind_to_controller: bool,
        rig_name: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimpleBinding {
    pub params: BindingParams,
    pub source: BindingSource,
}

impl SimpleBinding {
    pub fn node(source: NodeId) -> Self {
        Self {
            params: BindingParams::default(),
            source: BindingSource::Node { source },
        }
    }

    pub fn bone(user: UserId, bone: BoneType) -> Self {
        Self {
            params: BindingParams::default(),
            source: BindingSource::Bone {
                user,
                bone,
                bind_to_controller: false,
            },
        }
    }

    pub fn rig_bone(user: UserId, bone: BoneType, rig_name: impl Into<String>) -> Self {
        Self {
            params: BindingParams::default(),
            source: BindingSource::RigBone {
                user,
                bone,
                bind_to_controller: false,
                rig_name: rig_name.into(),
            },
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.params.priority = priority;
        self
    }

    pub fn with_partial_fit(mut self, partial_fit: bool) -> Self {
        self.params.partial_fit = partial_fit;
        self
    }

    pub fn with_sync(mut self, position: bool, rotation: bool, scale: bool) -> Self {
        self.params.sync_position = position;
        self.params.sync_rotation = rotation;
        self.params.sync_scale = scale;
        self
    }

    pub fn with_offset_position(mut self, offset: [f32; 3], space: OffsetSpace) -> Self {
        self.params.offset_position = offset;
        self.params.offset_space = space;
        self
    }

    pub fn with_offset_rotation(mut self, offset: [f32; 4]) -> Self {
        self.params.offset_rotation = offset;
        self
    }

    pub fn with_offset_scale(mut self, offset: [f32; 3]) -> Self {
        self.params.offset_scale = offset;
        self
    }

    pub fn with_anchor(mut self, anchor: [f32; 3]) -> Self {
        self.params.anchor_position = anchor;
        self
    }

    pub fn with_controller(mut self) -> Self {
        match &mut self.source {
            BindingSource::Bone {
                bind_to_controller, ..
            }
            | BindingSource::RigBone {
                bind_to_controller, ..
            } => *bind_to_controller = true,
            BindingSource::Node { .. } => {}
        }
        self
    }
}

/// Group of simple bindings registered and removed together.
///
/// The group's priority is added to each child's, its `partial_fit` is or-ed in and its
/// sync flags mask the children's. Offsets only exist on the children.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiBinding {
    params: BindingParams,
    children: Vec<SimpleBinding>,
}

impl MultiBinding {
    pub fn new(params: BindingParams, children: Vec<SimpleBinding>) -> Result<Self, BindingError> {
        if children.is_empty() {
            return Err(BindingError::EmptyMultiBinding);
        }
        if !params.has_identity_offsets() {
            return Err(BindingError::MultiBindingOffset);
        }
        let children = children
            .into_iter()
            .map(|mut child| {
                let p = &mut child.params;
                p.priority = p.priority.saturating_add(params.priority);
                p.partial_fit |= params.partial_fit;
                p.sync_position &= params.sync_position;
                p.sync_rotation &= params.sync_rotation;
                p.sync_scale &= params.sync_scale;
                child
            })
            .collect();
        Ok(Self { params, children })
    }

    pub fn params(&self) -> &BindingParams {
        &self.params
    }

    /// Children with the group's settings folded in.
    pub fn children(&self) -> &[SimpleBinding] {
        &self.children
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    Simple(SimpleBinding),
    Multi(MultiBinding),
}

impl From<SimpleBinding> for Binding {
    fn from(b: SimpleBinding) -> Self {
        Binding::Simple(b)
    }
}

impl Binding {
    pub fn params(&self) -> &BindingParams {
        match self {
            Binding::Simple(b) => &b.params,
            Binding::Multi(m) => m.params(),
        }
    }

    /// The simple bindings this binding expands to at evaluation time.
    pub fn simple_bindings(&self) -> &[SimpleBinding] {
        match self {
            Binding::Simple(b) => std::slice::from_ref(b),
            Binding::Multi(m) => m.children(),
        }
    }

    pub fn reset_when_removed(&self) -> bool {
        self.params().reset_when_removed
    }
}
