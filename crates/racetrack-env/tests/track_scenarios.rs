use std::sync::Arc;

use approx::assert_relative_eq;
use racetrack_core::RLError;
use racetrack_env::action::{ACCEL_STEP, TURN_STEP};
use racetrack_env::kinematics::DEFAULT_MAX_SPEED;
use racetrack_env::{
    advance, Control, DriveAction, Environment, FrameSink, PoseRecorder, RaceTrackConfig, RaceTrackEnv, Reward,
    TimeLimit, TrackGeometry, VehicleState,
};

fn default_env() -> RaceTrackEnv {
    RaceTrackEnv::new(Arc::new(TrackGeometry::default()), RaceTrackConfig::default()).unwrap()
}

fn on_gate(heading: f64) -> VehicleState {
    // one tick of coasting at speed 1 keeps the car inside the gate band
    VehicleState {
        x: 675.0,
        y: 299.0,
        heading,
        speed: 1.0,
    }
}

#[test]
fn gate_crossed_heading_down_finishes() {
    let mut env = default_env();
    env.place(on_gate(90.0));
    let step = env.drive(DriveAction::Coast).unwrap();
    assert_eq!(step.reward, Reward(10.0));
    assert!(step.done);
    assert_eq!(step.info.get_str("outcome"), Some("finished"));
}

#[test]
fn gate_crossed_heading_right_is_wrong_way() {
    let mut env = default_env();
    env.place(on_gate(0.0));
    let step = env.drive(DriveAction::Coast).unwrap();
    assert_eq!(step.reward, Reward(-5.0));
    assert!(step.done);
    assert_eq!(step.info.get_str("outcome"), Some("wrong_way"));
}

fn accelerate_and_turn_right() -> Control {
    Control {
        accel_delta: ACCEL_STEP,
        turn_delta: TURN_STEP,
    }
}

#[test]
fn accelerating_turn_kinematics_matches_reference() {
    let mut state = VehicleState::at_rest(425.0, 150.0);
    for _ in 0..50 {
        state = advance(&state, accelerate_and_turn_right(), DEFAULT_MAX_SPEED);
    }
    assert_relative_eq!(state.x, 416.488_077_119_169_93, epsilon = 1e-9);
    assert_relative_eq!(state.y, 304.412_039_259_150_3, epsilon = 1e-9);
    assert_relative_eq!(state.heading, 150.0, epsilon = 1e-12);
    assert_relative_eq!(state.speed, 5.0, epsilon = 1e-12);
}

#[test]
fn accelerating_turn_through_environment_matches_reference() {
    let recorder = PoseRecorder::new();
    let mut env = default_env().with_frame_sink(recorder.clone());
    env.reset().unwrap();

    let mut total = 0.0;
    let mut outcomes = Vec::new();
    for _ in 0..50 {
        let step = env.apply(accelerate_and_turn_right()).unwrap();
        assert!(!step.done);
        total += step.reward.value();
        outcomes.push(step.info.get_str("outcome").unwrap().to_string());
    }

    // half a circle on the road, then into the hole in the middle
    assert!(outcomes[..25].iter().all(|o| o == "driving"), "{outcomes:?}");
    assert!(outcomes[25..].iter().all(|o| o == "off_road"), "{outcomes:?}");
    assert_relative_eq!(total, -25.25, epsilon = 1e-9);

    let pose = env.vehicle();
    assert_relative_eq!(pose.x, 416.488_077_119_169_93, epsilon = 1e-9);
    assert_relative_eq!(pose.y, 304.412_039_259_150_3, epsilon = 1e-9);
    assert_relative_eq!(pose.heading, 150.0, epsilon = 1e-12);
    assert_relative_eq!(pose.speed, 5.0, epsilon = 1e-12);
    assert_eq!(recorder.poses().unwrap().len(), 51);
}

#[test]
fn alternating_accelerate_and_turn_kinematics() {
    let mut state = VehicleState::at_rest(425.0, 150.0);
    for _ in 0..50 {
        state = advance(&state, DriveAction::Accelerate.control(), DEFAULT_MAX_SPEED);
        state = advance(&state, DriveAction::TurnRight.control(), DEFAULT_MAX_SPEED);
    }
    assert_relative_eq!(state.x, 416.069_121_262_870_34, epsilon = 1e-9);
    assert_relative_eq!(state.y, 459.057_941_808_454_87, epsilon = 1e-9);
    assert_relative_eq!(state.heading, 150.0, epsilon = 1e-12);
    assert_relative_eq!(state.speed, 5.0, epsilon = 1e-12);
}

#[test]
fn alternating_accelerate_and_turn_ends_in_hazard() {
    let mut env = default_env();
    env.reset().unwrap();

    let mut steps = 0;
    let mut total = 0.0;
    let mut last = None;
    'outer: for _ in 0..50 {
        for action in [DriveAction::Accelerate, DriveAction::TurnRight] {
            let step = env.drive(action).unwrap();
            steps += 1;
            total += step.reward.value();
            if step.done {
                last = Some(step);
                break 'outer;
            }
        }
    }

    let last = last.expect("alternating drive should terminate");
    assert_eq!(steps, 97);
    assert_eq!(last.info.get_str("outcome"), Some("hazard"));
    assert_relative_eq!(total, -53.53, epsilon = 1e-9);

    let pose = env.vehicle();
    assert_relative_eq!(pose.x, 428.785_953_961_246_83, epsilon = 1e-9);
    assert_relative_eq!(pose.y, 451.111_551_458_304_6, epsilon = 1e-9);
    assert_relative_eq!(pose.heading, 144.0, epsilon = 1e-12);
    assert_relative_eq!(pose.speed, 5.0, epsilon = 1e-12);
}

#[test]
fn clockwise_drive_reaches_the_gate() {
    let mut env = TimeLimit::new(default_env(), 1000);
    env.reset().unwrap();

    let mut accelerations = 0;
    let mut turns = 0;
    let mut rewards = Vec::new();
    let final_step = loop {
        let pose = *env.inner().vehicle();
        let action = if accelerations < 15 {
            accelerations += 1;
            DriveAction::Accelerate
        } else if pose.x < 620.0 && turns == 0 {
            DriveAction::Coast
        } else if turns < 30 {
            turns += 1;
            DriveAction::TurnRight
        } else {
            DriveAction::Coast
        };
        let step = env.step(action.into()).unwrap();
        rewards.push(step.reward.value());
        if step.done {
            break step;
        }
    };

    assert!(!final_step.truncated);
    assert_eq!(final_step.info.get_str("outcome"), Some("finished"));
    assert_eq!(final_step.reward, Reward(10.0));
    assert!(rewards.len() <= 1000);
    assert!(rewards[..rewards.len() - 1].iter().all(|&r| r == -0.01));
    assert_relative_eq!(env.inner().vehicle().heading, 90.0, epsilon = 1e-12);
}

#[test]
fn time_limit_truncates_long_episodes() {
    let mut env = TimeLimit::new(default_env(), 25);
    env.reset().unwrap();
    let mut count = 0;
    let last = loop {
        let step = env.step(DriveAction::Coast.into()).unwrap();
        count += 1;
        if step.done {
            break step;
        }
    };
    assert_eq!(count, 25);
    assert!(last.truncated);

    env.reset().unwrap();
    assert_eq!(env.steps, 0);
}

#[test]
fn frame_sink_sees_every_frame() {
    let recorder = PoseRecorder::new();
    let mut env = default_env().with_frame_sink(recorder.clone());
    env.reset().unwrap();
    for _ in 0..4 {
        env.drive(DriveAction::Accelerate).unwrap();
    }

    let poses = recorder.poses().unwrap();
    assert_eq!(poses.len(), 5);
    assert_eq!(poses[0], VehicleState::at_rest(425.0, 150.0));
    assert_eq!(poses[4], *env.vehicle());
}

struct RejectingSink;

impl FrameSink for RejectingSink {
    fn on_frame(&mut self, _track: &TrackGeometry, _vehicle: &VehicleState) -> racetrack_core::Result<()> {
        Err(RLError::FrameSink("renderer closed".into()))
    }
}

#[test]
fn rejected_frame_leaves_pose_unchanged() {
    let mut env = default_env().with_frame_sink(RejectingSink);
    let start = VehicleState {
        x: 425.0,
        y: 150.0,
        heading: 0.0,
        speed: 2.0,
    };
    env.place(start);

    assert!(matches!(env.drive(DriveAction::Accelerate), Err(RLError::FrameSink(_))));
    assert_eq!(*env.vehicle(), start);

    assert!(env.reset_at(100.0, 300.0).is_err());
    assert_eq!(*env.vehicle(), start);
}

#[test]
fn reset_at_uses_explicit_start() {
    let mut env = default_env();
    let obs = env.reset_at(100.0, 300.0).unwrap();
    assert_relative_eq!(f64::from(obs.data[0]), 100.0 / 800.0, epsilon = 1e-6);
    assert_relative_eq!(f64::from(obs.data[1]), 0.5, epsilon = 1e-6);
    assert_eq!(env.vehicle().speed, 0.0);
}
