//! Bound node → bindings index.

use indexmap::IndexMap;

use rigsync_api_core::{BindingId, NodeId};

use crate::error::BindingError;
use crate::model::Binding;
use crate::wire::BindingDto;

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredBinding {
    pub id: BindingId,
    pub binding: Binding,
}

/// Bindings per bound node, in registration order. Nodes iterate in the order their first
/// binding was added.
#[derive(Debug, Clone)]
pub struct BindingRegistry {
    nodes: IndexMap<NodeId, Vec<RegisteredBinding>>,
    activated: bool,
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            activated: true,
        }
    }

    /// Register `binding` on `node`. An existing binding with the same id on that node is
    /// replaced in place and returned.
    pub fn add_binding(&mut self, node: NodeId, id: BindingId, binding: Binding) -> Option<Binding> {
        let list = self.nodes.entry(node).or_default();
        if let Some(existing) = list.iter_mut().find(|rb| rb.id == id) {
            log::info!("binding {:?} on node {:?} replaced", id, node);
            return Some(std::mem::replace(&mut existing.binding, binding));
        }
        log::info!("binding {:?} added on node {:?}", id, node);
        list.push(RegisteredBinding { id, binding });
        None
    }

    /// Convert and register a wire message. Nothing is stored when conversion fails.
    pub fn add_dto(&mut self, dto: BindingDto) -> Result<Option<Binding>, BindingError> {
        let binding = Binding::try_from(dto.data)?;
        Ok(self.add_binding(dto.bound_node_id, dto.id, binding))
    }

    /// Remove one binding. Unknown nodes or ids are ignored.
    pub fn remove_binding(&mut self, node: NodeId, id: BindingId) -> Option<Binding> {
        let list = self.nodes.get_mut(&node)?;
        let pos = list.iter().position(|rb| rb.id == id)?;
        let removed = list.remove(pos);
        if list.is_empty() {
            self.nodes.shift_remove(&node);
        }
        log::info!("binding {:?} removed from node {:?}", id, node);
        Some(removed.binding)
    }

    /// Remove every binding of `node`.
    pub fn remove_bindings(&mut self, node: NodeId) -> Vec<RegisteredBinding> {
        let removed = self.nodes.shift_remove(&node).unwrap_or_default();
        if !removed.is_empty() {
            log::info!("{} binding(s) removed from node {:?}", removed.len(), node);
        }
        removed
    }

    pub fn bindings(&self, node: NodeId) -> &[RegisteredBinding] {
        self.nodes.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[RegisteredBinding])> {
        self.nodes.iter().map(|(n, l)| (*n, l.as_slice()))
    }

    /// Number of bound nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn binding_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Returns the previous value.
    pub fn set_bindings_activated(&mut self, activated: bool) -> bool {
        let prev = self.activated;
        if prev != activated {
            log::info!("bindings activated: {}", activated);
        }
        self.activated = activated;
        prev
    }

    pub fn are_bindings_activated(&self) -> bool {
        self.activated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SimpleBinding;

    fn node_binding(src: u64, priority: i32) -> Binding {
        SimpleBinding::node(NodeId(src)).with_priority(priority).into()
    }

    #[test]
    fn add_replaces_same_id_in_place() {
        let mut reg = BindingRegistry::new();
        assert!(reg.add_binding(NodeId(1), BindingId(1), node_binding(10, 0)).is_none());
        assert!(reg.add_binding(NodeId(1), BindingId(2), node_binding(11, 0)).is_none());
        let old = reg.add_binding(NodeId(1), BindingId(1), node_binding(12, 5));
        assert_eq!(old, Some(node_binding(10, 0)));

        let ids: Vec<BindingId> = reg.bindings(NodeId(1)).iter().map(|rb| rb.id).collect();
        assert_eq!(ids, vec![BindingId(1), BindingId(2)]);
        assert_eq!(reg.bindings(NodeId(1))[0].binding, node_binding(12, 5));
        assert_eq!(reg.binding_count(), 2);
    }

    #[test]
    fn removing_unknown_binding_is_noop() {
        let mut reg = BindingRegistry::new();
        reg.add_binding(NodeId(1), BindingId(1), node_binding(10, 0));
        assert!(reg.remove_binding(NodeId(1), BindingId(99)).is_none());
        assert!(reg.remove_binding(NodeId(42), BindingId(1)).is_none());
        assert_eq!(reg.binding_count(), 1);
        assert!(reg.remove_bindings(NodeId(42)).is_empty());
    }

    #[test]
    fn last_removal_drops_node_entry() {
        let mut reg = BindingRegistry::new();
        reg.add_binding(NodeId(1), BindingId(1), node_binding(10, 0));
        reg.add_binding(NodeId(2), BindingId(1), node_binding(10, 0));
        assert!(reg.remove_binding(NodeId(1), BindingId(1)).is_some());
        assert!(!reg.contains(NodeId(1)));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.remove_bindings(NodeId(2)).len(), 1);
        assert!(reg.is_empty());
    }

    #[test]
    fn activation_flag_keeps_bindings() {
        let mut reg = BindingRegistry::default();
        assert!(reg.are_bindings_activated());
        reg.add_binding(NodeId(1), BindingId(1), node_binding(10, 0));
        assert!(reg.set_bindings_activated(false));
        assert!(!reg.are_bindings_activated());
        assert_eq!(reg.binding_count(), 1);
    }
}
