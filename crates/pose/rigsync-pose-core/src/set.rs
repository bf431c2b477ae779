//! All overrider containers that apply to one skeleton.

use indexmap::IndexMap;

use rigsync_api_core::NodeId;

use crate::condition::PoseEnvironment;
use crate::error::PoseError;
use crate::handler::{HandlerConfig, PoseEvent, PoseOverriderHandler, PosePlayback};
use crate::overrider::PoseOverriderContainer;

/// One handler per container node, checked in the order containers were added.
#[derive(Debug, Clone, Default)]
pub struct PoseOverriderSet {
    config: HandlerConfig,
    handlers: IndexMap<NodeId, PoseOverriderHandler>,
}

impl PoseOverriderSet {
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            handlers: IndexMap::new(),
        }
    }

    /// Validate and install `container`, replacing the one already on its node.
    pub fn add_container(&mut self, container: PoseOverriderContainer) -> Result<(), PoseError> {
        container.validate()?;
        let config = self.config;
        let handler = self
            .handlers
            .entry(container.node)
            .or_insert_with(|| PoseOverriderHandler::new(config));
        handler.set_pose_overrider_container(Some(container));
        Ok(())
    }

    /// Remove the container on `node`, stopping its pose. Returns `false` for unknown nodes.
    pub fn remove_container(&mut self, node: NodeId, playback: &mut dyn PosePlayback) -> bool {
        match self.handlers.shift_remove(&node) {
            Some(mut handler) => {
                handler.take_container(playback);
                log::info!("pose overrider container removed from {:?}", node);
                true
            }
            None => false,
        }
    }

    /// Returns `false` for unknown nodes.
    pub fn set_hover(&mut self, node: NodeId, hover: bool) -> bool {
        match self.handlers.get_mut(&node) {
            Some(h) => {
                h.set_hover(hover);
                true
            }
            None => false,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        for h in self.handlers.values_mut() {
            h.advance(dt);
        }
    }

    /// Check every handler. Returns the nodes whose container had a satisfiable overrider.
    pub fn check_all(
        &mut self,
        env: &dyn PoseEnvironment,
        playback: &mut dyn PosePlayback,
    ) -> Vec<NodeId> {
        self.handlers
            .iter_mut()
            .filter_map(|(node, h)| h.check_trigger_conditions(env, &mut *playback).then_some(*node))
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<PoseEvent> {
        self.handlers
            .values_mut()
            .flat_map(|h| h.drain_events())
            .collect()
    }

    pub fn handler(&self, node: NodeId) -> Option<&PoseOverriderHandler> {
        self.handlers.get(&node)
    }

    pub fn handler_mut(&mut self, node: NodeId) -> Option<&mut PoseOverriderHandler> {
        self.handlers.get_mut(&node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
