//! State controller scenario tests

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::*;
use crate::params::test_params;
use comms_if::eqpt::TipForceData;
use comms_if::tc::PosingMode;

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

/// A controller with joints reporting their unpacked positions.
fn fresh_controller() -> StateController {
    let mut sc = StateController::new(test_params()).unwrap();
    sc.init_model(true);
    sc
}

/// A controller with joints reporting their packed positions.
fn packed_controller() -> StateController {
    let mut sc = StateController::new(test_params()).unwrap();
    for leg in sc.model_mut().legs_mut() {
        for joint in leg.joints_mut() {
            joint.current_position = joint.packed_position;
            joint.position_initialised = true;
        }
    }
    sc.model_mut().init_legs(false);
    sc
}

/// Tick until the predicate holds, panicking after `max_ticks`.
fn tick_until<F>(sc: &mut StateController, max_ticks: usize, what: &str, predicate: F) -> usize
where
    F: Fn(&StateController) -> bool,
{
    for tick in 0..max_ticks {
        sc.tick().unwrap();
        if predicate(sc) {
            return tick + 1;
        }
    }
    panic!("'{}' did not happen within {} ticks", what, max_ticks);
}

/// A controller driven all the way into RUNNING.
fn running_controller() -> StateController {
    let mut sc = fresh_controller();
    sc.system_state_input(SystemState::Running);
    tick_until(&mut sc, 3000, "reach RUNNING", |sc| {
        sc.system_state() == SystemState::Running && !sc.transition_state_flag()
    });
    sc
}

/// Drive the walker into MOVING with a forward command.
fn start_walking(sc: &mut StateController) {
    sc.body_velocity_input(0.1, 0.0, 0.0);
    tick_until(sc, 3000, "start walking", |sc| {
        sc.walker().walk_state() == WalkState::Moving
    });
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

/// Cold start from the packed state: UNKNOWN -> PACKED -> READY (unpack) ->
/// RUNNING (startup choreography), then a zero-velocity tick leaves the legs
/// at the walking default pose.
#[test]
fn test_cold_start_from_packed() {
    let mut sc = packed_controller();

    // Nothing happens before the first user command
    sc.tick().unwrap();
    assert_eq!(sc.system_state(), SystemState::WaitingForUser);

    sc.system_state_input(SystemState::Running);

    tick_until(&mut sc, 10, "resolve UNKNOWN", |sc| {
        sc.system_state() == SystemState::Packed
    });
    tick_until(&mut sc, 500, "unpack to READY", |sc| {
        sc.system_state() == SystemState::Ready
    });
    tick_until(&mut sc, 1000, "stand up to RUNNING", |sc| {
        sc.system_state() == SystemState::Running
    });

    // Transition flag cleared once current == new
    assert!(!sc.transition_state_flag());

    // A zero-velocity tick produces targets at the walking default pose
    sc.tick().unwrap();
    for leg in sc.model().legs() {
        let offset = leg.desired_tip_position() - leg.stepper.default_tip_position;
        assert!(
            offset.norm() < 1e-6,
            "leg {} is {} m from its default",
            leg.id_name(),
            offset.norm()
        );
    }
}

/// A packed robot without a startup choreography cannot be driven and must
/// abort with an operator-actionable error.
#[test]
fn test_packed_without_startup_sequence_is_fatal() {
    let mut params = test_params();
    params.pose.start_up_sequence = false;
    let mut sc = StateController::new(params).unwrap();
    for leg in sc.model_mut().legs_mut() {
        for joint in leg.joints_mut() {
            joint.current_position = joint.packed_position;
            joint.position_initialised = true;
        }
    }
    sc.model_mut().init_legs(false);

    sc.system_state_input(SystemState::Running);
    sc.tick().unwrap();

    let result = sc.tick();
    assert!(matches!(
        result,
        Err(FatalError::PackedWithoutStartupSequence)
    ));
}

/// Tripod walking: legs 0/2/4 and 1/3/5 are half a cycle out of phase and
/// exactly three legs are in stance at any tick; joint limits hold
/// throughout.
#[test]
fn test_tripod_walking_invariants() {
    let mut sc = running_controller();
    start_walking(&mut sc);

    // Let the starting transient finish
    for _ in 0..250 {
        sc.tick().unwrap();
    }

    for _ in 0..400 {
        sc.tick().unwrap();

        let stance_count = sc
            .model()
            .legs()
            .iter()
            .filter(|leg| {
                matches!(
                    leg.stepper.step_state,
                    crate::walk_ctrl::StepState::Stance | crate::walk_ctrl::StepState::ForceStance
                )
            })
            .count();
        assert_eq!(stance_count, 3);

        for leg in sc.model().legs() {
            for joint in leg.joints() {
                assert!(joint.desired_position >= joint.min_position - 1e-12);
                assert!(joint.desired_position <= joint.max_position + 1e-12);
                assert!(joint.desired_velocity.abs() <= joint.max_angular_speed + 1e-9);
            }
        }
    }
}

/// Gait change while walking: the robot is forced to stop, the new gait
/// parameters load and the flag clears.
#[test]
fn test_gait_change_while_walking() {
    let mut sc = running_controller();
    start_walking(&mut sc);

    sc.gait_selection_input(GaitDesignation::Wave);
    assert!(sc.gait_change_flag());

    tick_until(&mut sc, 2000, "gait change completes", |sc| {
        !sc.gait_change_flag()
    });

    assert_eq!(sc.params().walk.gait_type, "wave_gait");
    assert_eq!(sc.walker().walk_state(), WalkState::Stopped);
    assert_eq!(sc.walker().gait_name(), "wave_gait");
}

/// Manual leg takeover: WALKING -> WALKING_TO_MANUAL -> MANUAL, count
/// bookkeeping, delta-z exclusion and the MAX_MANUAL_LEGS cap.
#[test]
fn test_manual_leg_takeover_and_cap() {
    let mut sc = running_controller();

    // Give the legs some tip force so delta_z would be nonzero if computed
    let raw = vec![1500.0; 12];
    sc.tip_force_input(&TipForceData { effort: raw });

    sc.primary_leg_selection_input(0);
    sc.primary_leg_state_toggle_input();
    tick_until(&mut sc, 500, "leg 0 becomes MANUAL", |sc| {
        sc.manual_leg_count() == 1
    });
    assert_eq!(
        sc.model().leg_by_id(0).unwrap().leg_state(),
        LegState::Manual
    );

    // Manual legs are excluded from the impedance loop
    sc.tick().unwrap();
    assert_eq!(sc.model().leg_by_id(0).unwrap().delta_z(), 0.0);
    assert!(sc.model().leg_by_id(3).unwrap().delta_z() > 0.0);

    // Pipeline ordering: a walking leg's IK input is its posed tip less its
    // delta-z; a manual leg's is the posed tip unchanged
    let leg = sc.model().leg_by_id(3).unwrap();
    let expected = leg.poser.current_tip_position - nalgebra::Vector3::new(0.0, 0.0, leg.delta_z());
    assert!((leg.desired_tip_position() - expected).norm() < 1e-12);
    let leg = sc.model().leg_by_id(0).unwrap();
    assert!((leg.desired_tip_position() - leg.poser.current_tip_position).norm() < 1e-12);

    // Second manual leg is allowed
    sc.primary_leg_selection_input(1);
    sc.primary_leg_state_toggle_input();
    tick_until(&mut sc, 500, "leg 1 becomes MANUAL", |sc| {
        sc.manual_leg_count() == 2
    });

    // Third is rejected
    sc.primary_leg_selection_input(2);
    sc.primary_leg_state_toggle_input();
    for _ in 0..10 {
        sc.tick().unwrap();
    }
    assert_eq!(sc.manual_leg_count(), 2);
    assert_eq!(
        sc.model().leg_by_id(2).unwrap().leg_state(),
        LegState::Walking
    );

    // Toggling back restores the count
    sc.primary_leg_selection_input(0);
    sc.primary_leg_state_toggle_input();
    tick_until(&mut sc, 500, "leg 0 returns to WALKING", |sc| {
        sc.manual_leg_count() == 1
    });
    assert_eq!(
        sc.model().leg_by_id(0).unwrap().leg_state(),
        LegState::Walking
    );
}

/// Parameter adjust while walking: the robot stops, the value steps and
/// clamps into bounds, the stance is re-taken and the flag clears.
#[test]
fn test_parameter_adjust_while_walking() {
    let mut sc = running_controller();
    start_walking(&mut sc);

    sc.parameter_selection_input(ParameterSelection::StepFrequency);
    sc.parameter_adjust_input(1);
    assert!(sc.parameter_adjust_flag());

    tick_until(&mut sc, 3000, "parameter adjust completes", |sc| {
        !sc.parameter_adjust_flag()
    });

    let p = &sc.params().walk.step_frequency;
    assert!((p.value - 1.1).abs() < 1e-9);
    assert_eq!(sc.walker().walk_state(), WalkState::Stopped);
}

/// A zero adjustment direction never raises the flag or changes a value.
#[test]
fn test_zero_adjustment_changes_nothing() {
    let mut sc = running_controller();

    sc.parameter_selection_input(ParameterSelection::StepFrequency);
    let before = sc.params().walk.step_frequency.value;
    sc.parameter_adjust_input(0);
    for _ in 0..10 {
        sc.tick().unwrap();
    }

    assert!(!sc.parameter_adjust_flag());
    assert_eq!(sc.params().walk.step_frequency.value, before);
}

/// An undefined transition request is fatal.
#[test]
fn test_undefined_transition_is_fatal() {
    let mut sc = running_controller();

    sc.system_state_input(SystemState::Unknown);
    let result = sc.tick();

    assert!(matches!(
        result,
        Err(FatalError::UndefinedTransition {
            from: SystemState::Running,
            to: SystemState::Unknown,
        })
    ));
}

/// Two consecutive zero-input ticks while stopped produce bit-identical
/// joint targets.
#[test]
fn test_stopped_ticks_are_deterministic() {
    let mut sc = running_controller();

    sc.tick().unwrap();
    let first: Vec<(f64, f64)> = sc
        .model()
        .legs()
        .iter()
        .flat_map(|leg| leg.joints().iter().map(|j| (j.desired_position, j.desired_velocity)))
        .collect();

    sc.tick().unwrap();
    let second: Vec<(f64, f64)> = sc
        .model()
        .legs()
        .iter()
        .flat_map(|leg| leg.joints().iter().map(|j| (j.desired_position, j.desired_velocity)))
        .collect();

    assert_eq!(first, second);
}

/// Tip forces below the offset clamp to zero.
#[test]
fn test_tip_force_clamping() {
    let mut sc = running_controller();
    let offset = sc.params().impedance.force_offset;
    let max = sc.params().impedance.max_force;

    // Below the offset
    sc.tip_force_input(&TipForceData {
        effort: vec![offset - 100.0; 12],
    });
    assert_eq!(sc.model().leg_by_id(0).unwrap().tip_force(), 0.0);

    // Far above the clamp
    sc.tip_force_input(&TipForceData {
        effort: vec![offset + max + 500.0; 12],
    });
    assert_eq!(sc.model().leg_by_id(0).unwrap().tip_force(), max);
}

/// Inputs that are not meaningful in the current state are silently
/// ignored.
#[test]
fn test_out_of_state_inputs_are_ignored() {
    let mut sc = fresh_controller();

    // Before the first user command nothing is actionable
    sc.gait_selection_input(GaitDesignation::Wave);
    sc.parameter_selection_input(ParameterSelection::StepFrequency);
    sc.parameter_adjust_input(1);
    sc.primary_leg_selection_input(0);
    sc.primary_leg_state_toggle_input();
    sc.posing_mode_input(PosingMode::XY);

    assert!(!sc.gait_change_flag());
    assert!(!sc.parameter_adjust_flag());
    sc.tick().unwrap();
    assert_eq!(sc.system_state(), SystemState::WaitingForUser);
}

/// The servo demand set covers every joint, with positions shifted back
/// into the actuator frame.
#[test]
fn test_servo_demands_cover_all_joints() {
    let sc = running_controller();
    let dems = sc.servo_demands();

    assert_eq!(dems.name.len(), 18);
    assert_eq!(dems.pos_rad.len(), 18);
    assert_eq!(dems.speed_rads.len(), 18);
    assert!(dems.name.contains(&"AR_coxa".to_string()));
    assert!(dems.name.contains(&"AL_tibia".to_string()));
}
