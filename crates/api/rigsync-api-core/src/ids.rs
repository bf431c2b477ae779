//! Identifiers shared across the workspace.

use serde::{Deserialize, Serialize};

/// Scene node identifier, as assigned by the environment.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Remote user identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Bone of the standard humanoid taxonomy. `0` is reserved for "no bone".
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoneType(pub u32);

impl BoneType {
    pub const NONE: BoneType = BoneType(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Binding identifier, unique per bound node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingId(pub u64);

/// Monotonic allocator for locally created nodes.
/// Starts high so generated ids do not collide with environment-assigned ones.
#[derive(Debug)]
pub struct NodeIdAllocator {
    next: u64,
}

impl Default for NodeIdAllocator {
    fn default() -> Self {
        Self { next: 1 << 48 }
    }
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}
