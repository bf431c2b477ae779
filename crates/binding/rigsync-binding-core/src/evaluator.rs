//! Per-tick binding composition.
//!
//! For every bound node the evaluator:
//! 1. expands multi-bindings into their children,
//! 2. orders the simple bindings by priority (highest first, ties in declaration order),
//! 3. lets each binding fill the channels it syncs that are still open on its target,
//! 4. converts the world-space result into the target's parent space.
//!
//! Sources are read from the scene as it was before the tick and every write is applied
//! afterwards. Targets are placed parents first: a target whose ancestor is also written
//! this tick is expressed relative to that ancestor's new pose.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use rigsync_api_core::math::{add3, div3, mul3, normalize_quat, quat_mul, quat_rotate, sub3};
use rigsync_api_core::{BindingId, BoneType, NodeId, Transform, UserId};

use crate::model::{BindingSource, Channel, OffsetSpace, SimpleBinding};
use crate::registry::{BindingRegistry, RegisteredBinding};
use crate::resolve::{BoneSource, SceneAccess};

/// Local-space values to write on one node. `None` channels keep their previous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformWrite {
    pub node: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
}

impl TransformWrite {
    pub fn apply_to(&self, mut local: Transform) -> Transform {
        if let Some(t) = self.translation {
            local.translation = t;
        }
        if let Some(r) = self.rotation {
            local.rotation = r;
        }
        if let Some(s) = self.scale {
            local.scale = s;
        }
        local
    }

    pub fn is_empty(&self) -> bool {
        self.translation.is_none() && self.rotation.is_none() && self.scale.is_none()
    }
}

/// A binding that could not be applied this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionFailure {
    BoundNodeMissing {
        node: NodeId,
    },
    SourceNodeMissing {
        node: NodeId,
        binding: BindingId,
        source: NodeId,
    },
    BoneMissing {
        node: NodeId,
        binding: BindingId,
        user: UserId,
        bone: BoneType,
        controller: bool,
    },
    RigMissing {
        node: NodeId,
        binding: BindingId,
        rig_name: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Bindings were deactivated; nothing was evaluated.
    pub skipped: bool,
    pub evaluated_nodes: usize,
    pub writes: Vec<TransformWrite>,
    pub failures: Vec<ResolutionFailure>,
}

struct PendingPosition {
    point: [f32; 3],
    anchor: [f32; 3],
}

/// Channels gathered for one target node.
struct TargetAccum {
    target: NodeId,
    closed: bool,
    position: Option<PendingPosition>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
}

impl TargetAccum {
    fn new(target: NodeId) -> Self {
        Self {
            target,
            closed: false,
            position: None,
            rotation: None,
            scale: None,
        }
    }

    fn is_filled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Position => self.position.is_some(),
            Channel::Rotation => self.rotation.is_some(),
            Channel::Scale => self.scale.is_some(),
        }
    }

    fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation.is_none() && self.scale.is_none()
    }
}

#[derive(Debug, Default)]
pub struct BindingEvaluator {
    ticks: u64,
}

impl BindingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks run so far, skipped ones included.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Evaluate every bound node of `registry` and write the results into `scene`.
    pub fn tick<S: SceneAccess + ?Sized>(
        &mut self,
        registry: &BindingRegistry,
        scene: &mut S,
        bones: &dyn BoneSource,
    ) -> TickReport {
        self.ticks += 1;
        if !registry.are_bindings_activated() {
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        }

        let mut report = TickReport::default();
        let mut targets = Vec::new();
        for (node, bindings) in registry.iter() {
            if bindings.is_empty() {
                continue;
            }
            report.evaluated_nodes += 1;
            targets.extend(Self::accumulate(node, bindings, &*scene, bones, &mut report.failures));
        }
        report.writes = place(targets, &*scene);

        for write in &report.writes {
            let Some(local) = scene.local_transform(write.node) else {
                continue;
            };
            scene.write_local_transform(write.node, write.apply_to(local));
        }
        for failure in &report.failures {
            log::debug!("binding not applied: {:?}", failure);
        }
        report
    }

    /// Compute the writes produced by the bindings of one bound node, without touching the
    /// scene.
    pub fn compose_node<S: SceneAccess + ?Sized>(
        node: NodeId,
        bindings: &[RegisteredBinding],
        scene: &S,
        bones: &dyn BoneSource,
        failures: &mut Vec<ResolutionFailure>,
    ) -> Vec<TransformWrite> {
        place(Self::accumulate(node, bindings, scene, bones, failures), scene)
    }

    fn accumulate<S: SceneAccess + ?Sized>(
        node: NodeId,
        bindings: &[RegisteredBinding],
        scene: &S,
        bones: &dyn BoneSource,
        failures: &mut Vec<ResolutionFailure>,
    ) -> Vec<TargetAccum> {
        if scene.world_transform(node).is_none() {
            failures.push(ResolutionFailure::BoundNodeMissing { node });
            return Vec::new();
        }

        let mut expanded: Vec<(BindingId, &SimpleBinding)> = bindings
            .iter()
            .flat_map(|rb| rb.binding.simple_bindings().iter().map(move |b| (rb.id, b)))
            .collect();
        // Stable: equal priorities keep declaration order.
        expanded.sort_by(|a, b| b.1.params.priority.cmp(&a.1.params.priority));

        let mut targets: Vec<TargetAccum> = Vec::new();
        for (id, binding) in expanded {
            let params = &binding.params;
            let target = match &binding.source {
                BindingSource::RigBone { rig_name, .. } => {
                    match scene.find_descendant(node, rig_name) {
                        Some(t) => t,
                        None => {
                            failures.push(ResolutionFailure::RigMissing {
                                node,
                                binding: id,
                                rig_name: rig_name.clone(),
                            });
                            continue;
                        }
                    }
                }
                _ => node,
            };
            let idx = match targets.iter().position(|t| t.target == target) {
                Some(i) => i,
                None => {
                    targets.push(TargetAccum::new(target));
                    targets.len() - 1
                }
            };
            let acc = &mut targets[idx];
            if acc.closed {
                continue;
            }

            let wants = |c: Channel| params.syncs(c) && !acc.is_filled(c);
            let (want_pos, want_rot, want_scale) = (
                wants(Channel::Position),
                wants(Channel::Rotation),
                wants(Channel::Scale),
            );
            if want_pos || want_rot || want_scale {
                let Some(src) = resolve_source(node, id, &binding.source, scene, bones, failures)
                else {
                    continue;
                };
                if want_rot {
                    acc.rotation = Some(normalize_quat(quat_mul(src.rotation, params.offset_rotation)));
                }
                if want_scale {
                    acc.scale = Some(mul3(src.scale, params.offset_scale));
                }
                if want_pos {
                    let point = match params.offset_space {
                        OffsetSpace::Local => src.transform_point(params.offset_position),
                        OffsetSpace::World => add3(src.translation, params.offset_position),
                    };
                    acc.position = Some(PendingPosition {
                        point,
                        anchor: params.anchor_position,
                    });
                }
            }
            if !params.partial_fit {
                acc.closed = true;
            }
        }

        targets.retain(|acc| !acc.is_empty());
        targets
    }
}

fn resolve_source<S: SceneAccess + ?Sized>(
    node: NodeId,
    id: BindingId,
    source: &BindingSource,
    scene: &S,
    bones: &dyn BoneSource,
    failures: &mut Vec<ResolutionFailure>,
) -> Option<Transform> {
    let (resolved, failure) = match source {
        BindingSource::Node { source } => (
            scene.world_transform(*source),
            ResolutionFailure::SourceNodeMissing {
                node,
                binding: id,
                source: *source,
            },
        ),
        BindingSource::Bone {
            user,
            bone,
            bind_to_controller,
        }
        | BindingSource::RigBone {
            user,
            bone,
            bind_to_controller,
            ..
        } => (
            bones.bone_transform(*user, *bone, *bind_to_controller),
            ResolutionFailure::BoneMissing {
                node,
                binding: id,
                user: *user,
                bone: *bone,
                controller: *bind_to_controller,
            },
        ),
    };
    if resolved.is_none() {
        failures.push(failure);
    }
    resolved
}

fn depth<S: SceneAccess + ?Sized>(scene: &S, node: NodeId) -> usize {
    let mut depth = 0;
    let mut cur = node;
    while let Some(parent) = scene.parent(cur) {
        depth += 1;
        cur = parent;
    }
    depth
}

/// World transform of `node`'s parent, seen through the targets already placed this tick.
fn parent_world<S: SceneAccess + ?Sized>(
    scene: &S,
    node: NodeId,
    placed: &HashMap<NodeId, Transform>,
) -> Option<Transform> {
    let mut chain = Vec::new();
    let mut cur = node;
    while let Some(parent) = scene.parent(cur) {
        if let Some(base) = placed.get(&parent) {
            return chain.iter().rev().try_fold(*base, |world: Transform, a: &NodeId| {
                scene.local_transform(*a).map(|l| world.mul_transform(&l))
            });
        }
        chain.push(parent);
        cur = parent;
    }
    scene.parent_world_transform(node)
}

/// Turn accumulated world-space channels into local writes, parents before children.
fn place<S: SceneAccess + ?Sized>(mut targets: Vec<TargetAccum>, scene: &S) -> Vec<TransformWrite> {
    targets.sort_by_cached_key(|acc| depth(scene, acc.target));
    let mut placed: HashMap<NodeId, Transform> = HashMap::with_capacity(targets.len());
    let mut writes = Vec::with_capacity(targets.len());
    for acc in targets {
        let (Some(parent), Some(local)) = (
            parent_world(scene, acc.target, &placed),
            scene.local_transform(acc.target),
        ) else {
            continue;
        };
        let write = finalize(acc, &parent, &local);
        placed.insert(write.node, parent.mul_transform(&write.apply_to(local)));
        writes.push(write);
    }
    writes
}

fn finalize(acc: TargetAccum, parent: &Transform, local: &Transform) -> TransformWrite {
    // Unsynced channels keep their local value and follow the parent.
    let world_rotation = acc
        .rotation
        .unwrap_or_else(|| normalize_quat(quat_mul(parent.rotation, local.rotation)));
    let world_scale = acc.scale.unwrap_or_else(|| mul3(parent.scale, local.scale));
    let translation = acc.position.map(|p| {
        let pos = sub3(p.point, quat_rotate(world_rotation, mul3(p.anchor, world_scale)));
        parent.inverse_transform_point(pos)
    });

    TransformWrite {
        node: acc.target,
        translation,
        rotation: acc.rotation.map(|r| parent.local_rotation(r)),
        scale: acc.scale.map(|s| div3(s, parent.scale)),
    }
}
