use rigsync_api_core::{BoneType, NodeId, Transform};
use rigsync_pose_core::{
    HandlerConfig, HandlerState, PoseId, PoseOverriderContainer, PoseOverriderHandler, PosePlayback,
    StaticEnvironment,
};

#[derive(Default)]
struct Log(Vec<String>);

impl PosePlayback for Log {
    fn start_pose(&mut self, pose: PoseId, interpolate: bool) {
        self.0.push(format!("start {} {}", pose.0, interpolate));
    }

    fn stop_pose(&mut self, pose: PoseId) {
        self.0.push(format!("stop {}", pose.0));
    }
}

fn load(name: &str) -> PoseOverriderContainer {
    let c: PoseOverriderContainer =
        rigsync_test_fixtures::overriders::load(name).unwrap_or_else(|e| panic!("{name}: {e:#}"));
    c.validate().expect("fixture container is valid");
    c
}

fn hand_at(position: [f32; 3], target: NodeId) -> StaticEnvironment {
    StaticEnvironment::new()
        .with_bone(BoneType(13), position)
        .with_node(target, Transform::IDENTITY)
}

#[test]
fn shared_magnitude_condition_follows_the_bone() {
    let container = load("magnitude_trio");
    let target = container.node;
    let mut handler = PoseOverriderHandler::new(HandlerConfig::default());
    assert!(handler.set_pose_overrider_container(Some(container)));

    let mut log = Log::default();
    assert!(handler.check_trigger_conditions(&hand_at([0.0, 0.0, 0.0], target), &mut log));
    assert_eq!(handler.playing_pose(), Some(PoseId(1)));

    assert!(!handler.check_trigger_conditions(&hand_at([15.0, 15.0, 0.0], target), &mut log));
    assert_eq!(handler.state(), HandlerState::Idle);
    assert_eq!(log.0, vec!["start 1 true", "stop 1"]);
}

#[test]
fn null_container_leaves_handler_unusable() {
    let mut handler = PoseOverriderHandler::new(HandlerConfig::default());
    let mut log = Log::default();
    assert!(!handler.set_pose_overrider_container(None));
    assert!(!handler.check_trigger_conditions(&hand_at([0.0; 3], NodeId(500)), &mut log));
    assert!(log.0.is_empty());
}

#[test]
fn missing_target_never_satisfies() {
    let container = load("magnitude_trio");
    let mut handler = PoseOverriderHandler::new(HandlerConfig::default());
    handler.set_pose_overrider_container(Some(container));
    let mut log = Log::default();
    let env = StaticEnvironment::new().with_bone(BoneType(13), [0.0; 3]);
    assert!(!handler.check_trigger_conditions(&env, &mut log));
}

#[test]
fn interaction_and_composite_conditions() {
    let container = load("grab_handle");
    let handle = NodeId(601);
    let mut handler = PoseOverriderHandler::new(HandlerConfig {
        interpolate_poses: false,
        ambient_confirm_ticks: 0,
    });
    handler.set_pose_overrider_container(Some(container));
    let mut log = Log::default();

    let mut env = StaticEnvironment::new()
        .with_bone(BoneType(9), [0.0, 1.0, -1.0])
        .with_node(handle, Transform::from_translation([0.0, 1.0, 0.0]));

    // Within reach and full size: neither overrider holds.
    assert!(!handler.check_trigger_conditions(&env, &mut log));

    // Engaged and facing the handle, but the grab overrider is gated on hover.
    env.engaged.insert(handle);
    assert!(!handler.check_trigger_conditions(&env, &mut log));
    handler.set_hover(true);
    assert!(handler.check_trigger_conditions(&env, &mut log));
    assert_eq!(handler.playing_pose(), Some(PoseId(40)));

    // Hand walks away: the ambient overrider takes over immediately.
    handler.set_hover(false);
    env.bones.insert(BoneType(9), [0.0, 1.0, -10.0]);
    assert!(handler.check_trigger_conditions(&env, &mut log));
    assert_eq!(handler.playing_pose(), Some(PoseId(41)));
    assert_eq!(log.0, vec!["start 40 false", "stop 40", "start 41 false"]);
}
