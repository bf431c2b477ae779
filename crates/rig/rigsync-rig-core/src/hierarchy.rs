//! Bone hierarchy of the standard taxonomy and its instantiation into a scene.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use rigsync_api_core::{BoneType, NodeId, Scene, Transform};

use crate::error::RigError;

/// Parent bone and rest offset of one bone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoneRelation {
    /// [`BoneType::NONE`] for the root.
    pub parent: BoneType,
    pub relative_position: [f32; 3],
}

/// Wire/fixture form of one relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoneRelationSpec {
    pub bone: BoneType,
    #[serde(default = "none_bone")]
    pub parent: BoneType,
    #[serde(default)]
    pub relative_position: [f32; 3],
}

fn none_bone() -> BoneType {
    BoneType::NONE
}

/// Validated bone relation table: one root, every parent declared, no cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    relations: BTreeMap<BoneType, BoneRelation>,
    root: BoneType,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

impl Hierarchy {
    pub fn new(
        relations: impl IntoIterator<Item = (BoneType, BoneRelation)>,
    ) -> Result<Self, RigError> {
        let relations: BTreeMap<BoneType, BoneRelation> = relations.into_iter().collect();

        let roots: Vec<BoneType> = relations
            .iter()
            .filter(|(_, r)| r.parent.is_none())
            .map(|(b, _)| *b)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(RigError::NoRoot),
            [only] => *only,
            _ => return Err(RigError::MultipleRoots(roots)),
        };

        for (bone, rel) in &relations {
            if bone.is_none() {
                return Err(RigError::SentinelBone(*bone));
            }
            if !rel.parent.is_none() && !relations.contains_key(&rel.parent) {
                return Err(RigError::UnknownParent {
                    bone: *bone,
                    parent: rel.parent,
                });
            }
        }

        // Walk each parent chain; reaching an in-progress bone means a cycle that never
        // reaches the root.
        let mut marks: HashMap<BoneType, Mark> = HashMap::with_capacity(relations.len());
        for bone in relations.keys() {
            let mut chain = Vec::new();
            let mut cur = *bone;
            loop {
                match marks.get(&cur) {
                    Some(Mark::Done) => break,
                    Some(Mark::InProgress) => return Err(RigError::BoneCycle(cur)),
                    None => {}
                }
                marks.insert(cur, Mark::InProgress);
                chain.push(cur);
                let parent = relations[&cur].parent;
                if parent.is_none() {
                    break;
                }
                cur = parent;
            }
            for b in chain {
                marks.insert(b, Mark::Done);
            }
        }

        Ok(Self { relations, root })
    }

    pub fn from_specs(specs: impl IntoIterator<Item = BoneRelationSpec>) -> Result<Self, RigError> {
        Self::new(specs.into_iter().map(|s| {
            (
                s.bone,
                BoneRelation {
                    parent: s.parent,
                    relative_position: s.relative_position,
                },
            )
        }))
    }

    pub fn root(&self) -> BoneType {
        self.root
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn relation(&self, bone: BoneType) -> Option<&BoneRelation> {
        self.relations.get(&bone)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&BoneType, &BoneRelation)> {
        self.relations.iter()
    }

    /// Create one scene node per bone under `root` and return them ordered by bone type.
    ///
    /// Parents are created before their children; each node's local position is its
    /// relation's rest offset.
    pub fn generate(&self, scene: &mut Scene, root: NodeId) -> Result<Vec<(BoneType, NodeId)>, RigError> {
        if !scene.contains(root) {
            return Err(RigError::Scene(rigsync_api_core::SceneError::UnknownNode(root)));
        }
        let mut created: HashMap<BoneType, NodeId> = HashMap::with_capacity(self.relations.len());
        for bone in self.relations.keys() {
            let mut visiting = Vec::new();
            self.create_bone(*bone, scene, root, &mut created, &mut visiting)?;
        }
        Ok(self
            .relations
            .keys()
            .filter_map(|b| created.get(b).map(|n| (*b, *n)))
            .collect())
    }

    fn create_bone(
        &self,
        bone: BoneType,
        scene: &mut Scene,
        root: NodeId,
        created: &mut HashMap<BoneType, NodeId>,
        visiting: &mut Vec<BoneType>,
    ) -> Result<NodeId, RigError> {
        if let Some(node) = created.get(&bone) {
            return Ok(*node);
        }
        if visiting.contains(&bone) {
            return Err(RigError::BoneCycle(bone));
        }
        visiting.push(bone);

        let rel = self.relations[&bone];
        let parent_node = if rel.parent.is_none() {
            root
        } else {
            self.create_bone(rel.parent, scene, root, created, visiting)?
        };
        let node = scene.create_node(format!("bone_{}", bone.0), Some(parent_node))?;
        scene.set_local(node, Transform::from_translation(rel.relative_position))?;
        created.insert(bone, node);
        visiting.pop();
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(parent: u32, pos: [f32; 3]) -> BoneRelation {
        BoneRelation {
            parent: BoneType(parent),
            relative_position: pos,
        }
    }

    #[test]
    fn generate_parents_bones_per_relation() {
        let h = Hierarchy::new([
            (BoneType(3), rel(2, [0.0, 0.5, 0.0])),
            (BoneType(1), rel(0, [0.0, 1.0, 0.0])),
            (BoneType(2), rel(1, [0.0, 0.2, 0.0])),
        ])
        .unwrap();
        assert_eq!(h.root(), BoneType(1));

        let mut scene = Scene::new();
        let root = scene.create_node("avatar", None).unwrap();
        let out = h.generate(&mut scene, root).unwrap();
        let map: HashMap<BoneType, NodeId> = out.iter().copied().collect();
        assert_eq!(out.len(), 3);
        assert_eq!(scene.parent(map[&BoneType(1)]), Some(root));
        assert_eq!(scene.parent(map[&BoneType(2)]), Some(map[&BoneType(1)]));
        assert_eq!(scene.parent(map[&BoneType(3)]), Some(map[&BoneType(2)]));
        assert_eq!(scene.local(map[&BoneType(3)]).unwrap().translation, [0.0, 0.5, 0.0]);
        let head = scene.world(map[&BoneType(3)]).unwrap().translation;
        assert!((head[1] - 1.7).abs() < 1e-6);
    }

    #[test]
    fn rejects_invalid_tables() {
        assert_eq!(Hierarchy::new(Vec::new()).unwrap_err(), RigError::NoRoot);
        assert!(matches!(
            Hierarchy::new([(BoneType(1), rel(0, [0.0; 3])), (BoneType(2), rel(0, [0.0; 3]))]),
            Err(RigError::MultipleRoots(_))
        ));
        assert_eq!(
            Hierarchy::new([(BoneType(1), rel(0, [0.0; 3])), (BoneType(2), rel(9, [0.0; 3]))])
                .unwrap_err(),
            RigError::UnknownParent {
                bone: BoneType(2),
                parent: BoneType(9)
            }
        );
        assert!(matches!(
            Hierarchy::new([
                (BoneType(1), rel(0, [0.0; 3])),
                (BoneType(2), rel(3, [0.0; 3])),
                (BoneType(3), rel(2, [0.0; 3])),
            ]),
            Err(RigError::BoneCycle(_))
        ));
    }

    #[test]
    fn generate_requires_existing_root() {
        let h = Hierarchy::new([(BoneType(1), rel(0, [0.0; 3]))]).unwrap();
        let mut scene = Scene::new();
        assert!(matches!(
            h.generate(&mut scene, NodeId(7)),
            Err(RigError::Scene(_))
        ));
    }
}
