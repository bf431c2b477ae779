//! Commands arriving from the network and the queue that hands them to the tick.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rigsync_api_core::{BindingId, NodeId};
use rigsync_binding_core::BindingDto;
use rigsync_pose_core::PoseOverriderContainer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SessionCommand {
    AddBinding {
        binding: BindingDto,
    },
    RemoveBinding {
        node: NodeId,
        id: BindingId,
    },
    RemoveBindings {
        node: NodeId,
    },
    SetBindingsActivated {
        activated: bool,
    },
    AddPoseContainer {
        container: PoseOverriderContainer,
    },
    RemovePoseContainer {
        node: NodeId,
    },
    SetHover {
        node: NodeId,
        hover: bool,
    },
    SetEngaged {
        interactable: NodeId,
        engaged: bool,
    },
}

/// Cloneable handle onto a FIFO of pending commands. Any thread may push; the session
/// drains it at the start of each step.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<SessionCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: SessionCommand) {
        self.inner.lock().push_back(command);
    }

    pub fn extend(&self, commands: impl IntoIterator<Item = SessionCommand>) {
        self.inner.lock().extend(commands);
    }

    /// Take up to `limit` commands in arrival order; `0` takes all of them.
    pub fn drain(&self, limit: usize) -> Vec<SessionCommand> {
        let mut q = self.inner.lock();
        let n = if limit == 0 { q.len() } else { limit.min(q.len()) };
        q.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
