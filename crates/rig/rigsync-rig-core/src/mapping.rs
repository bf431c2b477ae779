//! Skeleton mappings: which link drives which standard bone.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use rigsync_api_core::{BoneType, Pose};

use crate::error::RigError;
use crate::link::{LinkGraph, LinkId, LinkSpec, PoseSource};

/// Binds one output bone to a link of the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkeletonMapping {
    pub bone_type: BoneType,
    pub link: LinkId,
}

/// Serializable description of a full retargeting map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MapperSpec {
    pub links: Vec<LinkSpec>,
    pub mappings: Vec<SkeletonMapping>,
}

/// A compiled link graph plus the bones it drives.
#[derive(Debug, Clone)]
pub struct SkeletonMapper {
    graph: LinkGraph,
    /// (bone, link index) in declaration order.
    mappings: Vec<(BoneType, usize)>,
}

impl SkeletonMapper {
    pub fn new(graph: LinkGraph, mappings: Vec<SkeletonMapping>) -> Result<Self, RigError> {
        let mut seen = HashSet::with_capacity(mappings.len());
        let mut resolved = Vec::with_capacity(mappings.len());
        for m in mappings {
            if m.bone_type.is_none() {
                return Err(RigError::SentinelBone(m.bone_type));
            }
            if !seen.insert(m.bone_type) {
                return Err(RigError::DuplicateMapping(m.bone_type));
            }
            let idx = graph
                .index_of(&m.link)
                .ok_or_else(|| RigError::UnknownMappingLink {
                    bone: m.bone_type,
                    link: m.link.clone(),
                })?;
            resolved.push((m.bone_type, idx));
        }
        Ok(Self {
            graph,
            mappings: resolved,
        })
    }

    pub fn from_spec(spec: MapperSpec) -> Result<Self, RigError> {
        let graph = LinkGraph::build(spec.links)?;
        Self::new(graph, spec.mappings)
    }

    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    pub fn bones(&self) -> impl Iterator<Item = BoneType> + '_ {
        self.mappings.iter().map(|(b, _)| *b)
    }

    /// Pose of a single mapped bone.
    pub fn compute_bone(&self, bone: BoneType, source: &dyn PoseSource) -> Option<Pose> {
        let (_, idx) = self.mappings.iter().find(|(b, _)| *b == bone)?;
        self.graph.compute_index(*idx, source)
    }

    /// Poses for every mapped bone whose sources resolve, in declaration order.
    pub fn compute(&self, source: &dyn PoseSource) -> Vec<(BoneType, Pose)> {
        let all = self.graph.evaluate_all(source);
        let mut out = Vec::with_capacity(self.mappings.len());
        for (bone, idx) in &self.mappings {
            match all[*idx] {
                Some(pose) => out.push((*bone, pose)),
                None => log::debug!("bone {:?} unresolved this tick", bone),
            }
        }
        out
    }
}
