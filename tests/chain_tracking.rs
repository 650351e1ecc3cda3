use approx::assert_abs_diff_eq;
use nalgebra::Vector3;
use servochain::{
    Actuator, BodyArena, ChainError, ChainTracker, EffectorRelation, HousingSide, Pose, Servo, SolverConfig,
};

type Tracker = ChainTracker<String, Servo>;

fn servo_at(x: f64) -> Servo {
    Servo::new(Pose::from_position(Vector3::new(x, 0.0, 0.0)), Vector3::z())
}

/// A planar arm: `hull - link_0 - ... - link_{n-1} - gripper`, one unit between the servos,
/// the gripper one unit past the last one.
fn planar_arm(n: usize, config: SolverConfig) -> (BodyArena<(), String>, Tracker) {
    let mut tree = BodyArena::new();
    let mut parent = tree.set_root((), "hull".to_string());
    let mut tracker = Tracker::new(config);
    for i in 0..n {
        parent = tree.add((), format!("link_{i}"), &parent).unwrap();
        tracker.add_joint(parent.clone(), servo_at(i as f64)).unwrap();
    }
    tree.add((), "gripper".to_string(), &parent).unwrap();
    tracker
        .set_effector("gripper".to_string(), Pose::from_position(Vector3::new(n as f64, 0.0, 0.0)))
        .unwrap();
    (tree, tracker)
}

/// Ticks until close enough, asserting the distance never grows. Returns the last distance.
fn track(tracker: &mut Tracker, target: &Pose, ticks: usize) -> f64 {
    let mut last = f64::INFINITY;
    for _ in 0..ticks {
        let info = tracker.step(target).unwrap();
        assert_eq!(info.iteration_count, 1);
        assert!(info.distance <= last + 1e-9, "distance grew from {last} to {}", info.distance);
        last = info.distance;
        if last < 1e-9 {
            break;
        }
    }
    last
}

#[test_log::test]
fn test_wiring() {
    let (tree, mut tracker) = planar_arm(2, SolverConfig::default());

    let order = tracker.resolve(&tree, &tree).unwrap();
    assert_eq!(order.joints(), &["link_1".to_string(), "link_0".to_string()]);
    assert_eq!(order.relation(), EffectorRelation::EffectorIsChild);

    let first = tracker.joint(&"link_0".to_string()).unwrap();
    let second = tracker.joint(&"link_1".to_string()).unwrap();
    let effector = tracker.effector_node().unwrap();
    assert_eq!(
        tracker.hierarchy().chain(effector).unwrap(),
        &[first.base(), first.moving(), second.base(), second.moving(), effector]
    );
    assert_abs_diff_eq!(
        tracker.effector_pose().unwrap().position,
        Vector3::new(2.0, 0.0, 0.0),
        epsilon = 1e-12
    );
}

#[test_log::test]
fn test_resolve_keeps_turned_arm_in_place() {
    let mut tree = BodyArena::new();
    tree.set_root((), "hull".to_string());
    tree.add((), "link_0".to_string(), &"hull".to_string()).unwrap();
    tree.add((), "link_1".to_string(), &"link_0".to_string()).unwrap();
    tree.add((), "gripper".to_string(), &"link_1".to_string()).unwrap();

    // both servos start turned, link_1 mounted where link_0 points to
    let mut tracker = Tracker::default();
    tracker
        .add_joint("link_0".to_string(), servo_at(0.0).with_angle(90.0))
        .unwrap();
    tracker
        .add_joint(
            "link_1".to_string(),
            Servo::new(Pose::from_position(Vector3::y()), Vector3::z()).with_angle(60.0),
        )
        .unwrap();
    let gripper = Pose::from_position(Vector3::new(-0.5_f64.sqrt(), 1.5, 0.0));
    tracker.set_effector("gripper".to_string(), gripper).unwrap();

    tracker.resolve(&tree, &tree).unwrap();

    assert_abs_diff_eq!(tracker.effector_pose().unwrap().position, gripper.position, epsilon = 1e-9);
    for name in ["link_0", "link_1"] {
        let joint = tracker.joint(&name.to_string()).unwrap();
        assert!(joint.is_inverted());
        assert_abs_diff_eq!(joint.angle(tracker.hierarchy()).unwrap(), joint.actuator().angle(), epsilon = 1e-9);

        // wired below the previous joint but still at the mounting frame
        let (base, mounting) = (joint.base(), joint.actuator().mounting_pose());
        assert_eq!(tracker.hierarchy().chain(base).unwrap().len(), 5);
        assert_abs_diff_eq!(tracker.node_pose(base).unwrap().position, mounting.position, epsilon = 1e-9);
    }
}

#[test_log::test]
fn test_single_joint() {
    let (tree, mut tracker) = planar_arm(1, SolverConfig::default());
    tracker.resolve(&tree, &tree).unwrap();

    let target = Pose::from_position(Vector3::new(0.0, 1.0, 0.0));
    let distance = track(&mut tracker, &target, 10);

    assert!(distance < 1e-9);
    assert_abs_diff_eq!(tracker.effector_pose().unwrap().position, target.position, epsilon = 1e-9);
}

#[test_log::test]
fn test_two_joints() {
    let (tree, mut tracker) = planar_arm(2, SolverConfig::default());
    tracker.resolve(&tree, &tree).unwrap();

    let target = Pose::from_position(Vector3::new(1.0, 1.0, 0.0));
    let distance = track(&mut tracker, &target, 200);

    assert!(distance < 1e-6);
    assert_abs_diff_eq!(tracker.effector_pose().unwrap().position, target.position, epsilon = 1e-6);
}

#[test_log::test]
fn test_three_joints() {
    let (tree, mut tracker) = planar_arm(3, SolverConfig::default().with_tolerance(1e-9));
    tracker.resolve(&tree, &tree).unwrap();

    let target = Pose::from_position(Vector3::new(1.5, 1.5, 0.0));
    let distance = track(&mut tracker, &target, 500);

    assert!(distance < 1e-3);
    // all servos were commanded within their limits
    for joint in tracker.joints() {
        assert!(joint.actuator().angle().abs() < 180.0);
    }
}

#[test_log::test]
fn test_multiple_iterations_per_tick() {
    let (tree, mut tracker) = planar_arm(3, SolverConfig::new(500, 1e-6));
    tracker.resolve(&tree, &tree).unwrap();

    let info = tracker
        .step(&Pose::from_position(Vector3::new(1.5, 1.5, 0.0)))
        .unwrap();

    assert!(info.iteration_count > 1);
    assert!(info.distance <= 1e-6 || info.iteration_count == 500);
}

#[test_log::test]
fn test_target_at_effector() {
    let (tree, mut tracker) = planar_arm(3, SolverConfig::default());
    tracker.resolve(&tree, &tree).unwrap();

    let info = tracker
        .step(&Pose::from_position(Vector3::new(3.0, 0.0, 0.0)))
        .unwrap();

    assert_abs_diff_eq!(info.distance, 0.0, epsilon = 1e-12);
    for joint in tracker.joints() {
        assert_abs_diff_eq!(joint.actuator().angle(), 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_unresolved() {
    let (_, mut tracker) = planar_arm(2, SolverConfig::default());
    assert_eq!(tracker.step(&Pose::identity()), Err(ChainError::Unresolved));
}

#[test_log::test]
fn test_failed_resolve_keeps_chain() {
    let (mut tree, mut tracker) = planar_arm(2, SolverConfig::default());
    tracker.resolve(&tree, &tree).unwrap();
    let effector = tracker.effector_node().unwrap();
    let chain = tracker.hierarchy().chain(effector).unwrap().to_vec();

    // a servo on a side branch
    tree.add((), "antenna".to_string(), &"hull".to_string()).unwrap();
    tracker.add_joint("antenna".to_string(), servo_at(-1.0)).unwrap();

    assert_eq!(tracker.resolve(&tree, &tree), Err(ChainError::EffectorNotAtChainEnd));
    assert_eq!(tracker.order().unwrap().len(), 2);
    assert_eq!(tracker.hierarchy().chain(effector).unwrap(), chain.as_slice());

    // the previous chain is still driven
    let target = Pose::from_position(Vector3::new(1.0, 1.0, 0.0));
    assert!(track(&mut tracker, &target, 200) < 1e-6);
    assert_eq!(tracker.joint(&"antenna".to_string()).unwrap().actuator().angle(), 0.0);
}

#[test_log::test]
fn test_mounting_side_inverts() {
    let target = Pose::from_position(Vector3::new(0.0, 1.0, 0.0));

    // parent on the base side: the moving housing faces the gripper
    let (tree, mut tracker) = planar_arm(1, SolverConfig::default());
    tracker.resolve(&tree, &tree).unwrap();
    tracker.step(&target).unwrap();
    let joint = tracker.joint(&"link_0".to_string()).unwrap();
    assert!(joint.is_inverted());
    assert_abs_diff_eq!(joint.actuator().angle(), -90.0, epsilon = 1e-9);

    let (tree, mut tracker) = planar_arm(1, SolverConfig::default());
    let moving_side = |_: &String, _: &String| HousingSide::Moving;
    tracker.resolve(&tree, &moving_side).unwrap();
    tracker.step(&target).unwrap();
    let joint = tracker.joint(&"link_0".to_string()).unwrap();
    assert!(!joint.is_inverted());
    assert_abs_diff_eq!(joint.actuator().angle(), 90.0, epsilon = 1e-9);
}

#[test_log::test]
fn test_effector_is_parent() {
    // hull - X - Y, the hull is moved by the servos mounted below it
    let mut tree = BodyArena::new();
    let hull = tree.set_root((), "hull".to_string());
    let x = tree.add((), "X".to_string(), &hull).unwrap();
    let y = tree.add((), "Y".to_string(), &x).unwrap();

    let mut tracker = Tracker::default();
    tracker.add_joint(y.clone(), servo_at(2.0)).unwrap();
    tracker.add_joint(x.clone(), servo_at(1.0)).unwrap();
    tracker.set_effector(hull, Pose::identity()).unwrap();

    let order = tracker.resolve(&tree, &tree).unwrap();
    assert_eq!(order.joints(), &[x.clone(), y.clone()]);
    assert_eq!(order.relation(), EffectorRelation::EffectorIsParent);

    let effector = tracker.effector_node().unwrap();
    let (x, y) = (tracker.joint(&x).unwrap(), tracker.joint(&y).unwrap());
    assert_eq!(
        tracker.hierarchy().chain(effector).unwrap(),
        &[y.base(), y.moving(), x.base(), x.moving(), effector]
    );

    let target = Pose::from_position(Vector3::new(1.0, 1.0, 0.0));
    assert!(track(&mut tracker, &target, 200) < 1e-6);
}

#[test_log::test]
fn test_sync_after_vehicle_moved() {
    let (tree, mut tracker) = planar_arm(2, SolverConfig::default());
    tracker.resolve(&tree, &tree).unwrap();

    let lift = Vector3::new(0.0, 0.0, 5.0);
    for name in ["link_0", "link_1"] {
        let servo = tracker.joint_mut(&name.to_string()).unwrap().actuator_mut();
        let mut mounting = servo.mounting_pose();
        mounting.position += lift;
        servo.set_mounting_pose(mounting);
    }
    tracker.sync_with_actuators().unwrap();

    assert_abs_diff_eq!(
        tracker.effector_pose().unwrap().position,
        Vector3::new(2.0, 0.0, 5.0),
        epsilon = 1e-12
    );
}
