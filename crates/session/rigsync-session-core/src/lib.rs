//! rigsync-session
//!
//! One [`Session`] owns a scene, the binding registry, the tracked skeletons and the pose
//! overriders of a skeleton, and advances them together:
//!
//! 1. drain queued [`SessionCommand`]s (bounded by `max_commands_per_step`),
//! 2. evaluate bindings against the pre-tick scene and write the results,
//! 3. advance pose handlers and check their trigger conditions,
//! 4. return a serializable [`SessionFrame`].

pub mod command;
pub mod config;
pub mod error;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use rigsync_api_core::{BoneType, NodeId, Scene, Transform, UserId};
use rigsync_binding_core::{
    Binding, BindingEvaluator, BindingRegistry, ResolutionFailure, SkeletonPoses,
    TransformWrite,
};
use rigsync_pose_core::{PoseEnvironment, PoseEvent, PoseId, PoseOverriderSet, PosePlayback};
use rigsync_rig_core::{Hierarchy, PoseSource, SkeletonMapper};

pub use crate::command::{CommandQueue, SessionCommand};
pub use crate::config::SessionConfig;
pub use crate::error::SessionError;

/// Host services needed for one step.
pub struct TickContext<'a> {
    pub playback: &'a mut dyn PosePlayback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    PoseArmed { node: NodeId, pose: PoseId },
    PoseStarted { node: NodeId, pose: PoseId },
    PoseStopped { node: NodeId, pose: PoseId },
    /// A pose container had a satisfiable overrider this step.
    TriggerSatisfied { node: NodeId },
    /// A node's last binding was removed and its pre-binding local transform restored.
    NodeRestored { node: NodeId },
}

impl From<PoseEvent> for SessionEvent {
    fn from(e: PoseEvent) -> Self {
        match e {
            PoseEvent::Armed { node, pose } => SessionEvent::PoseArmed { node, pose },
            PoseEvent::Started { node, pose } => SessionEvent::PoseStarted { node, pose },
            PoseEvent::Stopped { node, pose } => SessionEvent::PoseStopped { node, pose },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedCommand {
    pub command: SessionCommand,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFrame {
    pub epoch: u64,
    pub dt: f32,
    /// Commands applied at the start of this step.
    pub applied: usize,
    pub rejected: Vec<RejectedCommand>,
    /// Bindings were deactivated and not evaluated.
    pub bindings_skipped: bool,
    pub writes: Vec<TransformWrite>,
    pub failures: Vec<ResolutionFailure>,
    pub events: Vec<SessionEvent>,
}

/// What pose conditions see of the session.
struct SessionEnvironment<'a> {
    scene: &'a Scene,
    skeletons: &'a SkeletonPoses,
    local_user: Option<UserId>,
    engaged: &'a HashSet<NodeId>,
}

impl PoseEnvironment for SessionEnvironment<'_> {
    fn bone_position(&self, bone: BoneType) -> Option<[f32; 3]> {
        let user = self.local_user?;
        self.skeletons.bone(user, bone).map(|t| t.translation)
    }

    fn node_transform(&self, node: NodeId) -> Option<Transform> {
        self.scene.world(node)
    }

    fn is_engaged(&self, interactable: NodeId) -> bool {
        self.engaged.contains(&interactable)
    }
}

/// Local transform of a node taken when it received its first binding.
#[derive(Debug, Clone, Copy)]
struct CapturedLocal {
    local: Transform,
    /// Some removed binding of the node asked for the capture to be restored.
    reset_requested: bool,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    epoch: u64,
    scene: Scene,
    registry: BindingRegistry,
    evaluator: BindingEvaluator,
    skeletons: SkeletonPoses,
    poses: PoseOverriderSet,
    engaged: HashSet<NodeId>,
    captured: HashMap<NodeId, CapturedLocal>,
    queue: CommandQueue,
    /// Events produced while applying commands, reported with the next frame.
    pending_events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_scene(config, Scene::new())
    }

    pub fn with_scene(config: SessionConfig, scene: Scene) -> Self {
        let mut registry = BindingRegistry::new();
        registry.set_bindings_activated(config.bindings_activated);
        let poses = PoseOverriderSet::new(config.handler_config());
        Self {
            config,
            epoch: 0,
            scene,
            registry,
            evaluator: BindingEvaluator::new(),
            skeletons: SkeletonPoses::new(),
            poses,
            engaged: HashSet::new(),
            captured: HashMap::new(),
            queue: CommandQueue::new(),
            pending_events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Handle for pushing commands, possibly from other threads.
    pub fn queue(&self) -> CommandQueue {
        self.queue.clone()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn skeletons(&self) -> &SkeletonPoses {
        &self.skeletons
    }

    pub fn skeletons_mut(&mut self) -> &mut SkeletonPoses {
        &mut self.skeletons
    }

    pub fn poses(&self) -> &PoseOverriderSet {
        &self.poses
    }

    pub fn set_local_user(&mut self, user: Option<UserId>) {
        self.config.local_user = user;
    }

    /// Instantiate `hierarchy` under `root` in the session scene.
    pub fn generate_hierarchy(
        &mut self,
        hierarchy: &Hierarchy,
        root: NodeId,
    ) -> Result<Vec<(BoneType, NodeId)>, SessionError> {
        Ok(hierarchy.generate(&mut self.scene, root)?)
    }

    /// Retarget a tracked skeleton onto `user`'s bones. Returns the number of bones updated.
    pub fn retarget(&mut self, user: UserId, mapper: &SkeletonMapper, source: &dyn PoseSource) -> usize {
        let poses = mapper.compute(source);
        for (bone, pose) in &poses {
            self.skeletons.set_bone(user, *bone, Transform::from(*pose));
        }
        poses.len()
    }

    /// Apply one command immediately.
    pub fn apply(
        &mut self,
        command: SessionCommand,
        playback: &mut dyn PosePlayback,
    ) -> Result<(), SessionError> {
        match command {
            SessionCommand::AddBinding { binding } => {
                let node = binding.bound_node_id;
                let converted = Binding::try_from(binding.data)?;
                if !self.registry.contains(node) {
                    if let Some(local) = self.scene.local(node) {
                        self.captured.insert(
                            node,
                            CapturedLocal {
                                local,
                                reset_requested: false,
                            },
                        );
                    }
                }
                self.registry.add_binding(node, binding.id, converted);
            }
            SessionCommand::RemoveBinding { node, id } => {
                if let Some(removed) = self.registry.remove_binding(node, id) {
                    self.after_removal(node, removed.reset_when_removed());
                }
            }
            SessionCommand::RemoveBindings { node } => {
                let removed = self.registry.remove_bindings(node);
                if !removed.is_empty() {
                    let reset = removed.iter().any(|rb| rb.binding.reset_when_removed());
                    self.after_removal(node, reset);
                }
            }
            SessionCommand::SetBindingsActivated { activated } => {
                self.registry.set_bindings_activated(activated);
            }
            SessionCommand::AddPoseContainer { container } => {
                self.poses.add_container(container)?;
            }
            SessionCommand::RemovePoseContainer { node } => {
                if !self.poses.remove_container(node, playback) {
                    log::warn!("remove of unknown pose overrider container {:?} ignored", node);
                }
                self.pending_events
                    .extend(self.poses.drain_events().into_iter().map(SessionEvent::from));
            }
            SessionCommand::SetHover { node, hover } => {
                if !self.poses.set_hover(node, hover) {
                    return Err(SessionError::UnknownPoseContainer(node));
                }
            }
            SessionCommand::SetEngaged {
                interactable,
                engaged,
            } => {
                if engaged {
                    self.engaged.insert(interactable);
                } else {
                    self.engaged.remove(&interactable);
                }
            }
        }
        Ok(())
    }

    fn after_removal(&mut self, node: NodeId, reset: bool) {
        if reset {
            if let Some(captured) = self.captured.get_mut(&node) {
                captured.reset_requested = true;
            }
        }
        if self.registry.contains(node) {
            return;
        }
        let Some(captured) = self.captured.remove(&node) else {
            return;
        };
        if captured.reset_requested && self.scene.set_local(node, captured.local).is_ok() {
            log::debug!("node {:?} restored after its last binding was removed", node);
            self.pending_events.push(SessionEvent::NodeRestored { node });
        }
    }

    /// Advance the session by `dt` seconds.
    pub fn step(&mut self, dt: f32, ctx: &mut TickContext<'_>) -> SessionFrame {
        self.epoch = self.epoch.wrapping_add(1);

        let mut applied = 0;
        let mut rejected = Vec::new();
        for command in self.queue.drain(self.config.max_commands_per_step) {
            match self.apply(command.clone(), &mut *ctx.playback) {
                Ok(()) => applied += 1,
                Err(e) => {
                    log::error!("command rejected: {e}");
                    rejected.push(RejectedCommand {
                        command,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let report = self
            .evaluator
            .tick(&self.registry, &mut self.scene, &self.skeletons);

        self.poses.advance(dt);
        let env = SessionEnvironment {
            scene: &self.scene,
            skeletons: &self.skeletons,
            local_user: self.config.local_user,
            engaged: &self.engaged,
        };
        let satisfied = self.poses.check_all(&env, &mut *ctx.playback);

        let mut events = std::mem::take(&mut self.pending_events);
        events.extend(self.poses.drain_events().into_iter().map(SessionEvent::from));
        events.extend(
            satisfied
                .into_iter()
                .map(|node| SessionEvent::TriggerSatisfied { node }),
        );

        SessionFrame {
            epoch: self.epoch,
            dt,
            applied,
            rejected,
            bindings_skipped: report.skipped,
            writes: report.writes,
            failures: report.failures,
            events,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
