//! Link primitives: a small expression graph that retargets tracked joints.
//!
//! Links are declared as flat [`LinkSpec`] records that reference their children by id
//! and are compiled once by [`LinkGraph::build`]. Compilation validates every reference
//! and rejects cycles, so a built graph can always be evaluated in a bounded number of
//! steps. Evaluation is a pure function of the [`PoseSource`] it reads from.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use rigsync_api_core::math::{
    add3, bezier3, lerp3, normalize3, normalize_quat, quat_mul, scale3, slerp,
    QUAT_IDENTITY,
};
use rigsync_api_core::Pose;

use crate::error::RigError;

pub type LinkId = String;

/// Name of an externally tracked joint or node (e.g. `"LeftHand"`).
pub type SourceKey = String;

fn identity_quat() -> [f32; 4] {
    QUAT_IDENTITY
}

/// Read-only access to the tracked skeleton a graph retargets from.
pub trait PoseSource {
    fn pose(&self, source: &str) -> Option<Pose>;
}

impl PoseSource for HashMap<SourceKey, Pose> {
    fn pose(&self, source: &str) -> Option<Pose> {
        self.get(source).copied()
    }
}

impl<T: PoseSource + ?Sized> PoseSource for &T {
    fn pose(&self, source: &str) -> Option<Pose> {
        (**self).pose(source)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkKind {
    /// Reads a tracked source as-is.
    Identity { source: SourceKey },
    /// Adds a position and rotation delta to `child`, in its local frame when `local`.
    Offset {
        child: LinkId,
        #[serde(default)]
        position: [f32; 3],
        #[serde(default = "identity_quat")]
        rotation: [f32; 4],
        #[serde(default)]
        local: bool,
    },
    /// Position lerp and rotation slerp between `a` and `b`.
    Lerp { a: LinkId, b: LinkId, factor: f32 },
    /// Cubic Bézier position between `a` and `b`; rotation slerps like [`LinkKind::Lerp`].
    BezierLerp {
        a: LinkId,
        b: LinkId,
        factor: f32,
        #[serde(default)]
        tangent_a: [f32; 3],
        #[serde(default)]
        tangent_a_local: bool,
        #[serde(default)]
        tangent_b: [f32; 3],
        #[serde(default)]
        tangent_b_local: bool,
    },
    /// Translates `child` by `distance` along `direction`.
    LineDistance {
        child: LinkId,
        distance: f32,
        direction: [f32; 3],
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSpec {
    pub id: LinkId,
    #[serde(flatten)]
    pub kind: LinkKind,
}

impl LinkSpec {
    pub fn identity(id: &str, source: &str) -> Self {
        Self {
            id: id.into(),
            kind: LinkKind::Identity {
                source: source.into(),
            },
        }
    }

    pub fn offset(id: &str, child: &str, position: [f32; 3], rotation: [f32; 4], local: bool) -> Self {
        Self {
            id: id.into(),
            kind: LinkKind::Offset {
                child: child.into(),
                position,
                rotation,
                local,
            },
        }
    }

    pub fn lerp(id: &str, a: &str, b: &str, factor: f32) -> Self {
        Self {
            id: id.into(),
            kind: LinkKind::Lerp {
                a: a.into(),
                b: b.into(),
                factor,
            },
        }
    }

    /// Bézier lerp with world-space tangents.
    pub fn bezier(id: &str, a: &str, b: &str, factor: f32, tangent_a: [f32; 3], tangent_b: [f32; 3]) -> Self {
        Self {
            id: id.into(),
            kind: LinkKind::BezierLerp {
                a: a.into(),
                b: b.into(),
                factor,
                tangent_a,
                tangent_a_local: false,
                tangent_b,
                tangent_b_local: false,
            },
        }
    }

    pub fn line_distance(id: &str, child: &str, distance: f32, direction: [f32; 3]) -> Self {
        Self {
            id: id.into(),
            kind: LinkKind::LineDistance {
                child: child.into(),
                distance,
                direction,
            },
        }
    }
}

/// Link with child references resolved to dense indices.
#[derive(Debug, Clone)]
enum CompiledLink {
    Identity {
        source: SourceKey,
    },
    Offset {
        child: usize,
        position: [f32; 3],
        rotation: [f32; 4],
        local: bool,
    },
    Lerp {
        a: usize,
        b: usize,
        factor: f32,
    },
    BezierLerp {
        a: usize,
        b: usize,
        factor: f32,
        tangent_a: [f32; 3],
        tangent_a_local: bool,
        tangent_b: [f32; 3],
        tangent_b_local: bool,
    },
    LineDistance {
        child: usize,
        distance: f32,
        direction: [f32; 3],
    },
}

impl CompiledLink {
    fn children(&self) -> [Option<usize>; 2] {
        match self {
            CompiledLink::Identity { .. } => [None, None],
            CompiledLink::Offset { child, .. } | CompiledLink::LineDistance { child, .. } => {
                [Some(*child), None]
            }
            CompiledLink::Lerp { a, b, .. } | CompiledLink::BezierLerp { a, b, .. } => {
                [Some(*a), Some(*b)]
            }
        }
    }

    /// Evaluate this link given a way to obtain child poses.
    fn eval<F>(&self, source: &dyn PoseSource, mut child: F) -> Option<Pose>
    where
        F: FnMut(usize) -> Option<Pose>,
    {
        match self {
            CompiledLink::Identity { source: key } => source.pose(key),
            CompiledLink::Offset {
                child: c,
                position,
                rotation,
                local,
            } => {
                let base = child(*c)?;
                if *local {
                    Some(Pose {
                        position: base.transform_point(*position),
                        rotation: normalize_quat(quat_mul(base.rotation, *rotation)),
                    })
                } else {
                    Some(Pose {
                        position: add3(base.position, *position),
                        rotation: normalize_quat(quat_mul(*rotation, base.rotation)),
                    })
                }
            }
            CompiledLink::Lerp { a, b, factor } => {
                let pa = child(*a)?;
                let pb = child(*b)?;
                Some(blend_endpoints(pa, pb, *factor).unwrap_or_else(|| Pose {
                    position: lerp3(pa.position, pb.position, *factor),
                    rotation: slerp(pa.rotation, pb.rotation, *factor),
                }))
            }
            CompiledLink::BezierLerp {
                a,
                b,
                factor,
                tangent_a,
                tangent_a_local,
                tangent_b,
                tangent_b_local,
            } => {
                let pa = child(*a)?;
                let pb = child(*b)?;
                if let Some(p) = blend_endpoints(pa, pb, *factor) {
                    return Some(p);
                }
                let ta = if *tangent_a_local {
                    pa.transform_point(*tangent_a)
                } else {
                    *tangent_a
                };
                let tb = if *tangent_b_local {
                    pb.transform_point(*tangent_b)
                } else {
                    *tangent_b
                };
                Some(Pose {
                    position: bezier3(pa.position, ta, tb, pb.position, *factor),
                    rotation: slerp(pa.rotation, pb.rotation, *factor),
                })
            }
            CompiledLink::LineDistance {
                child: c,
                distance,
                direction,
            } => {
                let base = child(*c)?;
                Some(Pose {
                    position: add3(base.position, scale3(*direction, *distance)),
                    rotation: base.rotation,
                })
            }
        }
    }
}

/// Blends collapse to their endpoints exactly at factor 0 and 1.
fn blend_endpoints(a: Pose, b: Pose, factor: f32) -> Option<Pose> {
    if factor <= 0.0 {
        Some(a)
    } else if factor >= 1.0 {
        Some(b)
    } else {
        None
    }
}

/// Validated, immutable link graph.
#[derive(Debug, Clone)]
pub struct LinkGraph {
    ids: Vec<LinkId>,
    index: HashMap<LinkId, usize>,
    links: Vec<CompiledLink>,
    /// Children-before-parents evaluation order.
    order: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl LinkGraph {
    /// Compile link specs, rejecting dangling references, invalid parameters and cycles.
    pub fn build(specs: Vec<LinkSpec>) -> Result<Self, RigError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(RigError::DuplicateLink(spec.id.clone()));
            }
        }

        let resolve = |link: &LinkId, child: &LinkId| -> Result<usize, RigError> {
            index.get(child).copied().ok_or_else(|| RigError::UnknownLink {
                link: link.clone(),
                child: child.clone(),
            })
        };
        let check_factor = |link: &LinkId, factor: f32| -> Result<f32, RigError> {
            if (0.0..=1.0).contains(&factor) {
                Ok(factor)
            } else {
                Err(RigError::InvalidFactor {
                    link: link.clone(),
                    factor,
                })
            }
        };

        let mut links = Vec::with_capacity(specs.len());
        let mut ids = Vec::with_capacity(specs.len());
        for spec in specs {
            let id = &spec.id;
            let compiled = match &spec.kind {
                LinkKind::Identity { source } => {
                    if source.is_empty() {
                        return Err(RigError::EmptySource(id.clone()));
                    }
                    CompiledLink::Identity {
                        source: source.clone(),
                    }
                }
                LinkKind::Offset {
                    child,
                    position,
                    rotation,
                    local,
                } => CompiledLink::Offset {
                    child: resolve(id, child)?,
                    position: *position,
                    rotation: normalize_quat(*rotation),
                    local: *local,
                },
                LinkKind::Lerp { a, b, factor } => CompiledLink::Lerp {
                    a: resolve(id, a)?,
                    b: resolve(id, b)?,
                    factor: check_factor(id, *factor)?,
                },
                LinkKind::BezierLerp {
                    a,
                    b,
                    factor,
                    tangent_a,
                    tangent_a_local,
                    tangent_b,
                    tangent_b_local,
                } => CompiledLink::BezierLerp {
                    a: resolve(id, a)?,
                    b: resolve(id, b)?,
                    factor: check_factor(id, *factor)?,
                    tangent_a: *tangent_a,
                    tangent_a_local: *tangent_a_local,
                    tangent_b: *tangent_b,
                    tangent_b_local: *tangent_b_local,
                },
                LinkKind::LineDistance {
                    child,
                    distance,
                    direction,
                } => CompiledLink::LineDistance {
                    child: resolve(id, child)?,
                    distance: *distance,
                    direction: normalize3(*direction)
                        .ok_or_else(|| RigError::ZeroDirection(id.clone()))?,
                },
            };
            links.push(compiled);
            ids.push(spec.id);
        }

        let order = topo_order(&ids, &links)?;
        Ok(Self {
            ids,
            index,
            links,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &LinkId> {
        self.ids.iter()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Evaluate one link. `None` when the id is unknown or a leaf source is unresolved.
    pub fn compute(&self, id: &str, source: &dyn PoseSource) -> Option<Pose> {
        self.compute_index(self.index_of(id)?, source)
    }

    pub(crate) fn compute_index(&self, idx: usize, source: &dyn PoseSource) -> Option<Pose> {
        self.links
            .get(idx)?
            .eval(source, |c| self.compute_index(c, source))
    }

    /// Evaluate every link once, children first. Entries are indexed like [`Self::index_of`].
    pub fn evaluate_all(&self, source: &dyn PoseSource) -> Vec<Option<Pose>> {
        let mut cache: Vec<Option<Pose>> = vec![None; self.links.len()];
        for &idx in &self.order {
            let pose = self.links[idx].eval(source, |c| cache[c]);
            cache[idx] = pose;
        }
        cache
    }
}

/// Depth-first post-order over the compiled links; an in-progress revisit is a cycle.
fn topo_order(ids: &[LinkId], links: &[CompiledLink]) -> Result<Vec<usize>, RigError> {
    let mut marks = vec![Mark::Unvisited; links.len()];
    let mut order = Vec::with_capacity(links.len());

    for start in 0..links.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // (node, next child slot to visit)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::InProgress;
        while let Some((node, slot)) = stack.pop() {
            let children = links[node].children();
            if slot < children.len() {
                stack.push((node, slot + 1));
                if let Some(c) = children[slot] {
                    match marks[c] {
                        Mark::Unvisited => {
                            marks[c] = Mark::InProgress;
                            stack.push((c, 0));
                        }
                        Mark::InProgress => return Err(RigError::LinkCycle(ids[c].clone())),
                        Mark::Done => {}
                    }
                }
            } else {
                marks[node] = Mark::Done;
                order.push(node);
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigsync_api_core::math::{quat_approx_eq, quat_from_axis_angle, vec3_approx_eq};
    use std::f32::consts::FRAC_PI_2;

    fn tracked() -> HashMap<SourceKey, Pose> {
        let mut m = HashMap::new();
        m.insert(
            "hand".to_string(),
            Pose::new([0.1, 0.7, 0.3], quat_from_axis_angle([0.0, 1.0, 0.0], 0.4)),
        );
        m.insert(
            "elbow".to_string(),
            Pose::new([0.3, 1.1, -0.2], quat_from_axis_angle([1.0, 0.0, 0.0], 1.3)),
        );
        m
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let src = tracked();
        for (factor, expected) in [(0.0, "hand"), (1.0, "elbow")] {
            let graph = LinkGraph::build(vec![
                LinkSpec::identity("a", "hand"),
                LinkSpec::identity("b", "elbow"),
                LinkSpec::lerp("mix", "a", "b", factor),
            ])
            .unwrap();
            let got = graph.compute("mix", &src).unwrap();
            let want = src.pose(expected).unwrap();
            assert_eq!(got.position, want.position);
            assert!(quat_approx_eq(got.rotation, want.rotation, 1e-6));
        }
    }

    #[test]
    fn bezier_matches_lerp_at_endpoints() {
        let src = tracked();
        for factor in [0.0, 1.0] {
            let graph = LinkGraph::build(vec![
                LinkSpec::identity("a", "hand"),
                LinkSpec::identity("b", "elbow"),
                LinkSpec::lerp("lin", "a", "b", factor),
                LinkSpec::bezier("bez", "a", "b", factor, [5.0, 5.0, 5.0], [-5.0, 0.0, 2.0]),
            ])
            .unwrap();
            assert_eq!(graph.compute("lin", &src), graph.compute("bez", &src));
        }
    }

    #[test]
    fn bezier_uses_local_tangents() {
        let mut src = HashMap::new();
        src.insert("a".to_string(), Pose::from_position([0.0, 0.0, 0.0]));
        src.insert("b".to_string(), Pose::from_position([4.0, 0.0, 0.0]));
        let graph = LinkGraph::build(vec![
            LinkSpec::identity("a", "a"),
            LinkSpec::identity("b", "b"),
            LinkSpec {
                id: "bez".into(),
                kind: LinkKind::BezierLerp {
                    a: "a".into(),
                    b: "b".into(),
                    factor: 0.5,
                    tangent_a: [1.0, 2.0, 0.0],
                    tangent_a_local: false,
                    tangent_b: [-1.0, 2.0, 0.0],
                    tangent_b_local: true,
                },
            },
        ])
        .unwrap();
        let p = graph.compute("bez", &src).unwrap();
        assert!(vec3_approx_eq(p.position, [2.0, 1.5, 0.0], 1e-6), "{p:?}");
    }

    #[test]
    fn offset_local_and_world_frames() {
        let mut src = HashMap::new();
        let turned = quat_from_axis_angle([0.0, 1.0, 0.0], FRAC_PI_2);
        src.insert("j".to_string(), Pose::new([1.0, 0.0, 0.0], turned));
        let graph = LinkGraph::build(vec![
            LinkSpec::identity("j", "j"),
            LinkSpec::offset("local", "j", [1.0, 0.0, 0.0], QUAT_IDENTITY, true),
            LinkSpec::offset("world", "j", [1.0, 0.0, 0.0], QUAT_IDENTITY, false),
        ])
        .unwrap();
        let local = graph.compute("local", &src).unwrap();
        let world = graph.compute("world", &src).unwrap();
        assert!(vec3_approx_eq(local.position, [1.0, 0.0, -1.0], 1e-5));
        assert!(vec3_approx_eq(world.position, [2.0, 0.0, 0.0], 1e-6));
        assert!(quat_approx_eq(local.rotation, turned, 1e-6));
    }

    #[test]
    fn line_distance_moves_along_normalized_direction() {
        let src = tracked();
        let graph = LinkGraph::build(vec![
            LinkSpec::identity("h", "hand"),
            LinkSpec::line_distance("tip", "h", 2.0, [0.0, 10.0, 0.0]),
        ])
        .unwrap();
        let p = graph.compute("tip", &src).unwrap();
        assert!(vec3_approx_eq(p.position, [0.1, 2.7, 0.3], 1e-6));
        assert_eq!(p.rotation, src.pose("hand").unwrap().rotation);
    }

    #[test]
    fn evaluate_all_agrees_with_compute() {
        let src = tracked();
        let graph = LinkGraph::build(vec![
            LinkSpec::lerp("mix", "a", "b", 0.25),
            LinkSpec::offset("off", "mix", [0.0, 0.1, 0.0], QUAT_IDENTITY, true),
            LinkSpec::identity("a", "hand"),
            LinkSpec::identity("b", "elbow"),
        ])
        .unwrap();
        let all = graph.evaluate_all(&src);
        for id in ["mix", "off", "a", "b"] {
            let idx = graph.index_of(id).unwrap();
            assert_eq!(all[idx], graph.compute(id, &src), "link {id}");
        }
    }

    #[test]
    fn missing_source_is_unresolved_not_fatal() {
        let graph = LinkGraph::build(vec![
            LinkSpec::identity("a", "hand"),
            LinkSpec::identity("b", "ghost"),
            LinkSpec::lerp("mix", "a", "b", 0.5),
        ])
        .unwrap();
        let src = tracked();
        assert!(graph.compute("a", &src).is_some());
        assert!(graph.compute("mix", &src).is_none());
        assert!(graph.compute("nope", &src).is_none());
    }

    #[test]
    fn build_rejects_bad_configurations() {
        let cycle = LinkGraph::build(vec![
            LinkSpec::offset("a", "b", [0.0; 3], QUAT_IDENTITY, false),
            LinkSpec::offset("b", "a", [0.0; 3], QUAT_IDENTITY, false),
        ]);
        assert!(matches!(cycle, Err(RigError::LinkCycle(_))));

        let self_loop = LinkGraph::build(vec![LinkSpec::line_distance("a", "a", 1.0, [1.0, 0.0, 0.0])]);
        assert!(matches!(self_loop, Err(RigError::LinkCycle(_))));

        let dangling = LinkGraph::build(vec![LinkSpec::lerp("m", "a", "b", 0.5)]);
        assert!(matches!(dangling, Err(RigError::UnknownLink { .. })));

        let factor = LinkGraph::build(vec![
            LinkSpec::identity("a", "hand"),
            LinkSpec::lerp("m", "a", "a", 1.5),
        ]);
        assert!(matches!(factor, Err(RigError::InvalidFactor { .. })));

        let dup = LinkGraph::build(vec![LinkSpec::identity("a", "x"), LinkSpec::identity("a", "y")]);
        assert_eq!(dup.unwrap_err(), RigError::DuplicateLink("a".into()));

        let dir = LinkGraph::build(vec![
            LinkSpec::identity("a", "hand"),
            LinkSpec::line_distance("d", "a", 1.0, [0.0; 3]),
        ]);
        assert_eq!(dir.unwrap_err(), RigError::ZeroDirection("d".into()));
    }

    #[test]
    fn specs_deserialize_from_json() {
        let json = r#"[
            {"id": "hand", "type": "identity", "source": "RightHand"},
            {"id": "palm", "type": "offset", "child": "hand", "position": [0, 0.05, 0], "local": true},
            {"id": "reach", "type": "line_distance", "child": "palm", "distance": 0.1, "direction": [0, 0, 1]}
        ]"#;
        let specs: Vec<LinkSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(specs.len(), 3);
        assert!(matches!(
            &specs[1].kind,
            LinkKind::Offset { rotation, local: true, .. } if *rotation == QUAT_IDENTITY
        ));
        let graph = LinkGraph::build(specs).unwrap();
        assert_eq!(graph.len(), 3);
    }
}
