//! In-memory transform tree.
//!
//! Hosts mirror the nodes they expose to the core into a [`Scene`]: each node has an
//! optional parent, a name, and a local [`Transform`]. World transforms are composed on
//! demand by walking the parent chain.

use hashbrown::HashMap;
use thiserror::Error;

use crate::ids::{NodeId, NodeIdAllocator};
use crate::transform::Transform;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("unknown scene node {0:?}")]
    UnknownNode(NodeId),
    #[error("scene node {0:?} already exists")]
    DuplicateNode(NodeId),
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    ParentCycle { child: NodeId, parent: NodeId },
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local: Transform,
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: HashMap<NodeId, SceneNode>,
    ids: NodeIdAllocator,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Create a node with a locally allocated id.
    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        let id = self.ids.alloc();
        self.insert_node(id, name, parent)?;
        Ok(id)
    }

    /// Insert a node under an id chosen by the environment.
    pub fn insert_node(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Result<(), SceneError> {
        if self.nodes.contains_key(&id) {
            return Err(SceneError::DuplicateNode(id));
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return Err(SceneError::UnknownNode(p));
            }
        }
        self.nodes.insert(
            id,
            SceneNode {
                name: name.into(),
                parent,
                children: Vec::new(),
                local: Transform::IDENTITY,
            },
        );
        if let Some(p) = parent {
            if let Some(pn) = self.nodes.get_mut(&p) {
                pn.children.push(id);
            }
        }
        Ok(())
    }

    /// Remove a node and its whole subtree. Returns the number of nodes removed.
    pub fn remove_node(&mut self, id: NodeId) -> usize {
        let Some(node) = self.nodes.get(&id) else {
            return 0;
        };
        if let Some(p) = node.parent {
            if let Some(pn) = self.nodes.get_mut(&p) {
                pn.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        let mut removed = 0;
        while let Some(cur) = stack.pop() {
            if let Some(n) = self.nodes.remove(&cur) {
                stack.extend(n.children);
                removed += 1;
            }
        }
        removed
    }

    /// Re-parent `child` under `parent` (or make it a root), keeping its local transform.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&child) {
            return Err(SceneError::UnknownNode(child));
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return Err(SceneError::UnknownNode(p));
            }
            if p == child || self.is_ancestor(child, p) {
                return Err(SceneError::ParentCycle { child, parent: p });
            }
        }
        let old = self.nodes.get(&child).and_then(|n| n.parent);
        if let Some(o) = old {
            if let Some(on) = self.nodes.get_mut(&o) {
                on.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = parent {
            if let Some(pn) = self.nodes.get_mut(&p) {
                pn.children.push(child);
            }
        }
        if let Some(cn) = self.nodes.get_mut(&child) {
            cn.parent = parent;
        }
        Ok(())
    }

    /// True when `ancestor` is found walking up from `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.nodes.get(&node).and_then(|n| n.parent);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.nodes.get(&c).and_then(|n| n.parent);
        }
        false
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    pub fn local(&self, id: NodeId) -> Option<Transform> {
        self.nodes.get(&id).map(|n| n.local)
    }

    pub fn set_local(&mut self, id: NodeId, local: Transform) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))?;
        node.local = local;
        Ok(())
    }

    /// World transform of `id`, composed from the root down.
    pub fn world(&self, id: NodeId) -> Option<Transform> {
        let node = self.nodes.get(&id)?;
        match node.parent {
            Some(p) => Some(self.world(p)?.mul_transform(&node.local)),
            None => Some(node.local),
        }
    }

    /// World transform of the parent of `id`; identity for roots.
    pub fn parent_world(&self, id: NodeId) -> Option<Transform> {
        let node = self.nodes.get(&id)?;
        match node.parent {
            Some(p) => self.world(p),
            None => Some(Transform::IDENTITY),
        }
    }

    /// Place `id` at a world transform by solving for its local transform.
    pub fn set_world(&mut self, id: NodeId, world: Transform) -> Result<(), SceneError> {
        let parent = self.parent_world(id).ok_or(SceneError::UnknownNode(id))?;
        self.set_local(id, parent.to_local(&world))
    }

    /// Breadth-first search for a descendant of `id` named `name`.
    pub fn find_descendant(&self, id: NodeId, name: &str) -> Option<NodeId> {
        let mut queue: std::collections::VecDeque<NodeId> =
            self.children(id).iter().copied().collect();
        while let Some(cur) = queue.pop_front() {
            let node = self.nodes.get(&cur)?;
            if node.name == name {
                return Some(cur);
            }
            queue.extend(node.children.iter().copied());
        }
        None
    }
}
