//! Per-container pose trigger state machine.
//!
//! ```text
//! Idle --(ambient selected)--> Armed --(still selected N checks)--> Playing
//! Idle --(trigger / hover-enter selected)------------------------> Playing
//! Playing --(nothing selected, min duration reached)--> Idle
//! Playing --(max duration reached)--> Idle (overrider held back until its conditions fail)
//! ```

use serde::{Deserialize, Serialize};

use rigsync_api_core::NodeId;

use crate::condition::PoseEnvironment;
use crate::overrider::{OverriderKind, PoseId, PoseOverrider, PoseOverriderContainer};

/// Pose playback service driven by the handler.
pub trait PosePlayback {
    fn start_pose(&mut self, pose: PoseId, interpolate: bool);
    fn stop_pose(&mut self, pose: PoseId);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Ask playback to blend into poses whose overrider allows it.
    pub interpolate_poses: bool,
    /// Further checks an ambient overrider must stay selected before its pose starts.
    pub ambient_confirm_ticks: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            interpolate_poses: true,
            ambient_confirm_ticks: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HandlerState {
    #[default]
    Idle,
    Armed { overrider: usize, ticks: u32 },
    Playing { overrider: usize, elapsed: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoseEvent {
    Armed { node: NodeId, pose: PoseId },
    Started { node: NodeId, pose: PoseId },
    Stopped { node: NodeId, pose: PoseId },
}

#[derive(Debug, Clone, Default)]
pub struct PoseOverriderHandler {
    config: HandlerConfig,
    container: Option<PoseOverriderContainer>,
    /// Per overrider: needs the hover signal to be a candidate.
    gated: Vec<bool>,
    state: HandlerState,
    hover: bool,
    /// Pose left playing by a replaced container.
    pending_stop: Option<(NodeId, PoseId)>,
    /// Overrider stopped at its max duration; not restarted until its conditions fail.
    held_back: Option<usize>,
    events: Vec<PoseEvent>,
}

impl PoseOverriderHandler {
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn container(&self) -> Option<&PoseOverriderContainer> {
        self.container.as_ref()
    }

    pub fn is_hover(&self) -> bool {
        self.hover
    }

    pub fn set_hover(&mut self, hover: bool) {
        self.hover = hover;
    }

    pub fn playing_pose(&self) -> Option<PoseId> {
        match self.state {
            HandlerState::Playing { overrider, .. } => Some(self.overrider(overrider)?.pose),
            _ => None,
        }
    }

    pub fn drain_events(&mut self) -> Vec<PoseEvent> {
        std::mem::take(&mut self.events)
    }

    /// Install a container. `None` is rejected and leaves the handler untouched.
    ///
    /// A pose still playing from the previous container is stopped on the next check.
    pub fn set_pose_overrider_container(&mut self, container: Option<PoseOverriderContainer>) -> bool {
        let Some(container) = container else {
            log::warn!("pose overrider container rejected: none given");
            return false;
        };
        if let HandlerState::Playing { overrider, .. } = self.state {
            let node = self.container.as_ref().map(|c| c.node);
            let pose = self.overrider(overrider).map(|o| o.pose);
            if let (Some(node), Some(pose)) = (node, pose) {
                self.pending_stop = Some((node, pose));
            }
        }
        self.gated = container
            .overriders
            .iter()
            .map(|o| !o.is_environmental())
            .collect();
        log::info!(
            "pose overrider container installed on {:?}: {} overrider(s), {} interaction-gated",
            container.node,
            container.overriders.len(),
            self.gated.iter().filter(|g| **g).count()
        );
        self.container = Some(container);
        self.state = HandlerState::Idle;
        self.held_back = None;
        true
    }

    /// Remove the container, stopping its pose if one is playing.
    pub fn take_container(&mut self, playback: &mut dyn PosePlayback) -> Option<PoseOverriderContainer> {
        self.flush_pending_stop(playback);
        if matches!(self.state, HandlerState::Playing { .. }) {
            self.stop_playing(playback);
        }
        self.state = HandlerState::Idle;
        self.gated.clear();
        self.held_back = None;
        self.container.take()
    }

    /// Accumulate playing time.
    pub fn advance(&mut self, dt: f32) {
        if let HandlerState::Playing { elapsed, .. } = &mut self.state {
            *elapsed += dt.max(0.0);
        }
    }

    /// Stop the playing pose. Returns `false` when no pose is playing.
    pub fn stop(&mut self, playback: &mut dyn PosePlayback) -> bool {
        match self.state {
            HandlerState::Playing { .. } => {
                self.stop_playing(playback);
                true
            }
            HandlerState::Armed { .. } => {
                self.state = HandlerState::Idle;
                false
            }
            HandlerState::Idle => false,
        }
    }

    /// Evaluate the candidate overriders and drive playback.
    ///
    /// Returns `true` when an overrider was selected. Without a container this is always
    /// `false`.
    pub fn check_trigger_conditions(
        &mut self,
        env: &dyn PoseEnvironment,
        playback: &mut dyn PosePlayback,
    ) -> bool {
        self.flush_pending_stop(playback);
        let Some(container) = &self.container else {
            return false;
        };

        if let Some(held) = self.held_back {
            if !container.overriders[held].conditions_hold(env) {
                self.held_back = None;
            }
        }

        if let HandlerState::Playing { overrider, elapsed } = self.state {
            let max = container.overriders[overrider].duration.max;
            if max.is_some_and(|max| elapsed >= max) {
                self.stop_playing(playback);
                self.held_back = Some(overrider);
            }
        }

        let selected = self.select(env);
        match (self.state, selected) {
            (HandlerState::Idle, None) => {}
            (HandlerState::Armed { .. }, None) => self.state = HandlerState::Idle,
            (HandlerState::Playing { overrider, elapsed }, None) => {
                if self.min_reached(overrider, elapsed) {
                    self.stop_playing(playback);
                }
            }
            (HandlerState::Idle, Some(sel)) => self.begin(sel, playback),
            (HandlerState::Armed { overrider, ticks }, Some(sel)) if overrider == sel => {
                let ticks = ticks + 1;
                if ticks >= self.config.ambient_confirm_ticks {
                    self.start(sel, playback);
                } else {
                    self.state = HandlerState::Armed { overrider, ticks };
                }
            }
            (HandlerState::Armed { .. }, Some(sel)) => self.begin(sel, playback),
            (HandlerState::Playing { overrider, .. }, Some(sel)) if overrider == sel => {}
            (HandlerState::Playing { overrider, elapsed }, Some(sel)) => {
                if self.min_reached(overrider, elapsed) {
                    self.stop_playing(playback);
                    self.begin(sel, playback);
                }
            }
        }
        selected.is_some()
    }

    fn overrider(&self, index: usize) -> Option<&PoseOverrider> {
        self.container.as_ref()?.overriders.get(index)
    }

    /// First candidate in declaration order whose conditions all hold.
    fn select(&self, env: &dyn PoseEnvironment) -> Option<usize> {
        let container = self.container.as_ref()?;
        container
            .overriders
            .iter()
            .enumerate()
            .filter(|(i, _)| self.hover || !self.gated[*i])
            .filter(|(i, _)| self.held_back != Some(*i))
            .find(|(_, o)| o.conditions_hold(env))
            .map(|(i, _)| i)
    }

    fn min_reached(&self, overrider: usize, elapsed: f32) -> bool {
        self.overrider(overrider)
            .map_or(true, |o| elapsed >= o.duration.min)
    }

    /// Enter the state a newly selected overrider leads to.
    fn begin(&mut self, index: usize, playback: &mut dyn PosePlayback) {
        let Some((kind, pose)) = self.overrider(index).map(|o| (o.kind(), o.pose)) else {
            return;
        };
        match kind {
            OverriderKind::Trigger | OverriderKind::HoverEnter => self.start(index, playback),
            OverriderKind::Ambient if self.config.ambient_confirm_ticks == 0 => {
                self.start(index, playback)
            }
            OverriderKind::Ambient => {
                self.state = HandlerState::Armed {
                    overrider: index,
                    ticks: 0,
                };
                if let Some(node) = self.container.as_ref().map(|c| c.node) {
                    self.events.push(PoseEvent::Armed { node, pose });
                }
            }
        }
    }

    fn start(&mut self, index: usize, playback: &mut dyn PosePlayback) {
        let Some(container) = &self.container else {
            return;
        };
        let Some(o) = container.overriders.get(index) else {
            return;
        };
        let interpolate = self.config.interpolate_poses && o.interpolable;
        playback.start_pose(o.pose, interpolate);
        log::debug!("pose {:?} started on {:?}", o.pose, container.node);
        self.events.push(PoseEvent::Started {
            node: container.node,
            pose: o.pose,
        });
        self.state = HandlerState::Playing {
            overrider: index,
            elapsed: 0.0,
        };
    }

    fn stop_playing(&mut self, playback: &mut dyn PosePlayback) {
        if let HandlerState::Playing { overrider, .. } = self.state {
            if let Some(container) = &self.container {
                if let Some(o) = container.overriders.get(overrider) {
                    playback.stop_pose(o.pose);
                    log::debug!("pose {:?} stopped on {:?}", o.pose, container.node);
                    self.events.push(PoseEvent::Stopped {
                        node: container.node,
                        pose: o.pose,
                    });
                }
            }
        }
        self.state = HandlerState::Idle;
    }

    fn flush_pending_stop(&mut self, playback: &mut dyn PosePlayback) {
        if let Some((node, pose)) = self.pending_stop.take() {
            playback.stop_pose(pose);
            self.events.push(PoseEvent::Stopped { node, pose });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{PoseCondition, StaticEnvironment};
    use rigsync_api_core::{BoneType, Transform};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(&'static str, PoseId, bool)>,
    }

    impl PosePlayback for Recorder {
        fn start_pose(&mut self, pose: PoseId, interpolate: bool) {
            self.calls.push(("start", pose, interpolate));
        }

        fn stop_pose(&mut self, pose: PoseId) {
            self.calls.push(("stop", pose, false));
        }
    }

    const TARGET: NodeId = NodeId(50);

    fn near_target() -> PoseCondition {
        PoseCondition::Magnitude {
            bone_origin: BoneType(13),
            target_object_id: TARGET,
            magnitude: 1.0,
        }
    }

    fn env_at(bone: [f32; 3]) -> StaticEnvironment {
        StaticEnvironment::new()
            .with_bone(BoneType(13), bone)
            .with_node(TARGET, Transform::IDENTITY)
    }

    fn handler_with(overriders: Vec<PoseOverrider>) -> PoseOverriderHandler {
        let mut h = PoseOverriderHandler::new(HandlerConfig::default());
        assert!(h.set_pose_overrider_container(Some(PoseOverriderContainer::new(NodeId(1), overriders))));
        h
    }

    #[test]
    fn none_container_is_rejected_and_state_kept() {
        let mut h = PoseOverriderHandler::default();
        let mut rec = Recorder::default();
        assert!(!h.set_pose_overrider_container(None));
        assert!(!h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));

        let mut h = handler_with(vec![PoseOverrider::new(PoseId(1), vec![near_target()]).trigger()]);
        assert!(h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        let before = h.state();
        assert!(!h.set_pose_overrider_container(None));
        assert_eq!(h.state(), before);
        assert_eq!(h.playing_pose(), Some(PoseId(1)));
    }

    #[test]
    fn trigger_starts_and_stops_with_conditions() {
        let mut h = handler_with(vec![PoseOverrider::new(PoseId(7), vec![near_target()]).trigger()]);
        let mut rec = Recorder::default();

        assert!(h.check_trigger_conditions(&env_at([0.5, 0.0, 0.0]), &mut rec));
        assert_eq!(h.playing_pose(), Some(PoseId(7)));
        assert!(h.check_trigger_conditions(&env_at([0.5, 0.0, 0.0]), &mut rec));
        assert!(!h.check_trigger_conditions(&env_at([15.0, 15.0, 0.0]), &mut rec));
        assert_eq!(h.state(), HandlerState::Idle);
        assert_eq!(rec.calls, vec![("start", PoseId(7), true), ("stop", PoseId(7), false)]);

        let events = h.drain_events();
        assert_eq!(
            events,
            vec![
                PoseEvent::Started { node: NodeId(1), pose: PoseId(7) },
                PoseEvent::Stopped { node: NodeId(1), pose: PoseId(7) },
            ]
        );
    }

    #[test]
    fn ambient_overrider_waits_for_confirmation() {
        let mut h = handler_with(vec![PoseOverrider::new(PoseId(3), vec![near_target()])]);
        let mut rec = Recorder::default();
        let env = env_at([0.0; 3]);

        assert!(h.check_trigger_conditions(&env, &mut rec));
        assert_eq!(h.state(), HandlerState::Armed { overrider: 0, ticks: 0 });
        assert!(rec.calls.is_empty());

        assert!(h.check_trigger_conditions(&env, &mut rec));
        assert_eq!(h.playing_pose(), Some(PoseId(3)));
        assert_eq!(rec.calls.len(), 1);
    }

    #[test]
    fn armed_overrider_is_dropped_when_conditions_fail() {
        let mut h = handler_with(vec![PoseOverrider::new(PoseId(3), vec![near_target()])]);
        let mut rec = Recorder::default();
        assert!(h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        assert!(!h.check_trigger_conditions(&env_at([5.0, 0.0, 0.0]), &mut rec));
        assert_eq!(h.state(), HandlerState::Idle);
        assert!(rec.calls.is_empty());
    }

    #[test]
    fn first_satisfiable_overrider_wins() {
        let far = PoseCondition::Magnitude {
            bone_origin: BoneType(13),
            target_object_id: TARGET,
            magnitude: 100.0,
        };
        let mut h = handler_with(vec![
            PoseOverrider::new(PoseId(1), vec![]).trigger(),
            PoseOverrider::new(PoseId(2), vec![near_target()]).trigger(),
            PoseOverrider::new(PoseId(3), vec![far]).trigger(),
        ]);
        let mut rec = Recorder::default();
        assert!(h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        assert_eq!(h.playing_pose(), Some(PoseId(2)));

        // Pose 2 no longer holds, pose 3 takes over.
        assert!(h.check_trigger_conditions(&env_at([5.0, 0.0, 0.0]), &mut rec));
        assert_eq!(h.playing_pose(), Some(PoseId(3)));
        assert_eq!(
            rec.calls,
            vec![
                ("start", PoseId(2), true),
                ("stop", PoseId(2), false),
                ("start", PoseId(3), true),
            ]
        );
    }

    #[test]
    fn hover_gates_interaction_overriders() {
        let mut h = handler_with(vec![PoseOverrider::new(PoseId(4), vec![near_target()]).hover_enter()]);
        let mut rec = Recorder::default();
        let env = env_at([0.0; 3]);
        assert!(!h.check_trigger_conditions(&env, &mut rec));
        h.set_hover(true);
        assert!(h.check_trigger_conditions(&env, &mut rec));
        assert_eq!(h.playing_pose(), Some(PoseId(4)));
        h.set_hover(false);
        assert!(!h.check_trigger_conditions(&env, &mut rec));
        assert_eq!(h.playing_pose(), None);
    }

    #[test]
    fn min_duration_delays_stop() {
        let mut h = handler_with(vec![
            PoseOverrider::new(PoseId(5), vec![near_target()]).trigger().with_duration(1.0, None)
        ]);
        let mut rec = Recorder::default();
        assert!(h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        h.advance(0.5);
        assert!(!h.check_trigger_conditions(&env_at([9.0, 0.0, 0.0]), &mut rec));
        assert_eq!(h.playing_pose(), Some(PoseId(5)));
        h.advance(0.5);
        assert!(!h.check_trigger_conditions(&env_at([9.0, 0.0, 0.0]), &mut rec));
        assert_eq!(h.playing_pose(), None);
    }

    #[test]
    fn max_duration_holds_overrider_back_until_conditions_fail() {
        let mut h = handler_with(vec![
            PoseOverrider::new(PoseId(6), vec![near_target()]).trigger().with_duration(0.0, Some(2.0))
        ]);
        let mut rec = Recorder::default();
        let near = env_at([0.0; 3]);
        assert!(h.check_trigger_conditions(&near, &mut rec));
        h.advance(2.5);
        assert!(!h.check_trigger_conditions(&near, &mut rec));
        assert_eq!(h.playing_pose(), None);
        assert!(!h.check_trigger_conditions(&near, &mut rec));

        assert!(!h.check_trigger_conditions(&env_at([9.0, 0.0, 0.0]), &mut rec));
        assert!(h.check_trigger_conditions(&near, &mut rec));
        assert_eq!(h.playing_pose(), Some(PoseId(6)));
    }

    #[test]
    fn replacing_container_stops_previous_pose_on_next_check() {
        let mut h = handler_with(vec![PoseOverrider::new(PoseId(8), vec![near_target()]).trigger()]);
        let mut rec = Recorder::default();
        assert!(h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        assert!(h.set_pose_overrider_container(Some(PoseOverriderContainer::new(NodeId(1), vec![]))));
        assert_eq!(h.state(), HandlerState::Idle);
        assert!(!h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        assert_eq!(rec.calls.last(), Some(&("stop", PoseId(8), false)));
    }

    #[test]
    fn stop_while_idle_fails() {
        let mut h = handler_with(vec![PoseOverrider::new(PoseId(9), vec![near_target()]).trigger()]);
        let mut rec = Recorder::default();
        assert!(!h.stop(&mut rec));
        assert!(h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        assert!(h.stop(&mut rec));
        assert_eq!(h.state(), HandlerState::Idle);
        assert!(!h.stop(&mut rec));
    }

    #[test]
    fn non_interpolable_overrider_starts_without_blending() {
        let mut o = PoseOverrider::new(PoseId(10), vec![near_target()]).trigger();
        o.interpolable = false;
        let mut h = handler_with(vec![o]);
        let mut rec = Recorder::default();
        assert!(h.check_trigger_conditions(&env_at([0.0; 3]), &mut rec));
        assert_eq!(rec.calls, vec![("start", PoseId(10), false)]);
    }
}
