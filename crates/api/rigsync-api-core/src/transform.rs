//! Transform (TRS) and Pose values.

use serde::{Deserialize, Serialize};

use crate::math::{
    add3, div3, mul3, normalize_quat, quat_inverse, quat_mul, quat_rotate, sub3, QUAT_IDENTITY,
    VEC3_ONE, VEC3_ZERO,
};

/// Position and rotation, the output of a link primitive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quat (x,y,z,w)
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: VEC3_ZERO,
        rotation: QUAT_IDENTITY,
    };

    pub fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: QUAT_IDENTITY,
        }
    }

    /// Map a point expressed in this pose's frame to world space.
    pub fn transform_point(&self, local: [f32; 3]) -> [f32; 3] {
        add3(self.position, quat_rotate(self.rotation, local))
    }
}

/// Transform with translation, rotation (quat), scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4], // quat (x,y,z,w)
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Pose> for Transform {
    fn from(p: Pose) -> Self {
        Transform {
            translation: p.position,
            rotation: p.rotation,
            scale: VEC3_ONE,
        }
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: VEC3_ZERO,
        rotation: QUAT_IDENTITY,
        scale: VEC3_ONE,
    };

    pub fn new(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: [f32; 4]) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.translation,
            rotation: self.rotation,
        }
    }

    /// Map a point from this transform's local space into its parent space.
    pub fn transform_point(&self, local: [f32; 3]) -> [f32; 3] {
        add3(
            self.translation,
            quat_rotate(self.rotation, mul3(self.scale, local)),
        )
    }

    /// Inverse of [`Transform::transform_point`].
    pub fn inverse_transform_point(&self, point: [f32; 3]) -> [f32; 3] {
        let rel = sub3(point, self.translation);
        div3(quat_rotate(quat_inverse(self.rotation), rel), self.scale)
    }

    /// `self * child`: the world transform of `child` expressed in `self`'s local space.
    /// Scale composes component-wise (lossy under non-uniform scale with rotation).
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.transform_point(child.translation),
            rotation: normalize_quat(quat_mul(self.rotation, child.rotation)),
            scale: mul3(self.scale, child.scale),
        }
    }

    /// Express a world transform in the local space of `self`.
    pub fn to_local(&self, world: &Transform) -> Transform {
        Transform {
            translation: self.inverse_transform_point(world.translation),
            rotation: self.local_rotation(world.rotation),
            scale: div3(world.scale, self.scale),
        }
    }

    /// Express a world rotation in the local space of `self`.
    pub fn local_rotation(&self, world_rotation: [f32; 4]) -> [f32; 4] {
        normalize_quat(quat_mul(quat_inverse(self.rotation), world_rotation))
    }
}
