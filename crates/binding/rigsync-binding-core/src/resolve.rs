//! Read/write access the evaluator needs from its environment.

use hashbrown::HashMap;

use rigsync_api_core::{BoneType, NodeId, Scene, Transform, UserId};

/// Scene graph as seen by the evaluator.
pub trait SceneAccess {
    fn world_transform(&self, node: NodeId) -> Option<Transform>;
    /// World transform of the node's parent; identity for roots.
    fn parent_world_transform(&self, node: NodeId) -> Option<Transform>;
    fn local_transform(&self, node: NodeId) -> Option<Transform>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn find_descendant(&self, node: NodeId, name: &str) -> Option<NodeId>;
    /// Returns `false` when the node no longer exists.
    fn write_local_transform(&mut self, node: NodeId, local: Transform) -> bool;
}

impl SceneAccess for Scene {
    fn world_transform(&self, node: NodeId) -> Option<Transform> {
        self.world(node)
    }

    fn parent_world_transform(&self, node: NodeId) -> Option<Transform> {
        self.parent_world(node)
    }

    fn local_transform(&self, node: NodeId) -> Option<Transform> {
        self.local(node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        Scene::parent(self, node)
    }

    fn find_descendant(&self, node: NodeId, name: &str) -> Option<NodeId> {
        Scene::find_descendant(self, node, name)
    }

    fn write_local_transform(&mut self, node: NodeId, local: Transform) -> bool {
        self.set_local(node, local).is_ok()
    }
}

/// World-space bone transforms of remote users.
pub trait BoneSource {
    /// With `controller` set, the raw tracked pose driving the bone rather than the bone.
    fn bone_transform(&self, user: UserId, bone: BoneType, controller: bool) -> Option<Transform>;
}

/// In-memory [`BoneSource`], fed from tracking frames.
#[derive(Debug, Clone, Default)]
pub struct SkeletonPoses {
    bones: HashMap<(UserId, BoneType), Transform>,
    controllers: HashMap<(UserId, BoneType), Transform>,
}

impl SkeletonPoses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bone(&mut self, user: UserId, bone: BoneType, world: Transform) {
        self.bones.insert((user, bone), world);
    }

    pub fn set_controller(&mut self, user: UserId, bone: BoneType, world: Transform) {
        self.controllers.insert((user, bone), world);
    }

    pub fn bone(&self, user: UserId, bone: BoneType) -> Option<Transform> {
        self.bones.get(&(user, bone)).copied()
    }

    pub fn controller(&self, user: UserId, bone: BoneType) -> Option<Transform> {
        self.controllers.get(&(user, bone)).copied()
    }

    /// Forget everything known about `user`.
    pub fn remove_user(&mut self, user: UserId) {
        self.bones.retain(|(u, _), _| *u != user);
        self.controllers.retain(|(u, _), _| *u != user);
    }

    pub fn clear(&mut self) {
        self.bones.clear();
        self.controllers.clear();
    }

    pub fn len(&self) -> usize {
        self.bones.len() + self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty() && self.controllers.is_empty()
    }
}

impl BoneSource for SkeletonPoses {
    fn bone_transform(&self, user: UserId, bone: BoneType, controller: bool) -> Option<Transform> {
        if controller {
            self.controller(user, bone)
        } else {
            self.bone(user, bone)
        }
    }
}

impl<T: BoneSource + ?Sized> BoneSource for &T {
    fn bone_transform(&self, user: UserId, bone: BoneType, controller: bool) -> Option<Transform> {
        (**self).bone_transform(user, bone, controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_and_bone_are_separate() {
        let mut poses = SkeletonPoses::new();
        poses.set_bone(UserId(1), BoneType(13), Transform::from_translation([1.0, 0.0, 0.0]));
        poses.set_controller(UserId(1), BoneType(13), Transform::from_translation([2.0, 0.0, 0.0]));
        poses.set_bone(UserId(2), BoneType(13), Transform::IDENTITY);

        let b = poses.bone_transform(UserId(1), BoneType(13), false).unwrap();
        let c = poses.bone_transform(UserId(1), BoneType(13), true).unwrap();
        assert_eq!(b.translation, [1.0, 0.0, 0.0]);
        assert_eq!(c.translation, [2.0, 0.0, 0.0]);
        assert!(poses.bone_transform(UserId(2), BoneType(13), true).is_none());

        poses.remove_user(UserId(1));
        assert_eq!(poses.len(), 1);
    }

    #[test]
    fn scene_access_writes_locals() {
        let mut scene = Scene::new();
        let root = scene.create_node("root", None).unwrap();
        let child = scene.create_node("rig", Some(root)).unwrap();
        assert_eq!(SceneAccess::find_descendant(&scene, root, "rig"), Some(child));
        assert!(scene.write_local_transform(child, Transform::from_translation([0.0, 1.0, 0.0])));
        assert_eq!(scene.world_transform(child).unwrap().translation, [0.0, 1.0, 0.0]);
        assert!(!scene.write_local_transform(NodeId(999), Transform::IDENTITY));
    }
}
