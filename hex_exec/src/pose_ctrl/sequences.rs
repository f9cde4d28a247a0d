//! Multi-tick pose choreographies
//!
//! Every sequence here returns a progress value in `[0, 1]` per tick and is
//! repeated by the state controller until it reports `1.0`. Step-like moves
//! work in two tripod groups so at least three legs stay grounded at all
//! times.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Vector2, Vector3};

// Internal
use super::{DirectMove, JointMove, PoseController};
use crate::model::{LegState, Model};
use crate::walk_ctrl::{StepState, WalkController};
use util::maths::{clamp, smooth_step};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Joint-space move destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointTarget {
    Packed,
    Unpacked,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseController {
    /// Interpolate every leg tip from its current position straight to its
    /// walking default over `time_to_start`. Used when no startup
    /// choreography is configured.
    pub fn direct_startup(&mut self, model: &mut Model, _walker: &WalkController) -> f64 {
        if self.direct_move.is_none() {
            let origins = model
                .legs()
                .iter()
                .map(|leg| leg.current_tip_position_fk())
                .collect();
            self.direct_move = Some(DirectMove {
                origins,
                elapsed: 0.0,
            });
        }

        let time_delta = self.time_delta();
        let duration = self.time_to_start();
        let mv = self.direct_move.as_mut().unwrap();
        mv.elapsed += time_delta;
        let progress = clamp(mv.elapsed / duration, 0.0, 1.0);

        for (leg, origin) in model.legs_mut().iter_mut().zip(mv.origins.iter()) {
            let target = leg.stepper.default_tip_position;
            let tip = smooth_step(*origin, target, progress);
            leg.poser.current_tip_position = tip;
            leg.set_desired_tip_position(tip);
            leg.apply_ik(true);
        }

        if progress >= 1.0 {
            self.direct_move = None;
            for leg in model.legs_mut() {
                leg.stepper.park();
                leg.poser.current_tip_position = leg.stepper.default_tip_position;
            }
        }

        progress
    }

    /// Joint-space move of every leg to its unpacked positions.
    pub fn unpack_legs(&mut self, model: &mut Model, duration: f64) -> f64 {
        self.move_joints_to(model, JointTarget::Unpacked, duration)
    }

    /// Joint-space move of every leg to its packed positions.
    pub fn pack_legs(&mut self, model: &mut Model, duration: f64) -> f64 {
        self.move_joints_to(model, JointTarget::Packed, duration)
    }

    /// Choreographed stand-up: level the body at walking height, then step
    /// each tripod group out to its default stance.
    pub fn start_up_sequence(&mut self, model: &mut Model, walker: &WalkController) -> f64 {
        let time_delta = self.time_delta();
        let duration = 1.0 / walker.step_frequency();
        let lift = walker.step_clearance_height();

        let step_progress = match self.sequence_step {
            // Bring every tip to walking depth without moving it planar
            0 => {
                let mut progress = 1.0f64;
                for leg in model.legs_mut() {
                    let current = leg.poser.current_tip_position;
                    let target = Vector3::new(
                        current.x,
                        current.y,
                        leg.stepper.default_tip_position.z,
                    );
                    progress =
                        progress.min(leg.poser.step_to_position(target, 0.0, duration, time_delta));
                }
                self.apply_sequence_ik(model);
                progress
            }
            // Step each tripod group to its default stance
            1 | 2 => {
                let group = self.sequence_step - 1;
                let mut progress = 1.0f64;
                for leg in model.legs_mut() {
                    if leg.id_number() % 2 != group {
                        continue;
                    }
                    let target = leg.stepper.default_tip_position;
                    progress = progress
                        .min(leg.poser.step_to_position(target, lift, duration, time_delta));
                }
                self.apply_sequence_ik(model);
                progress
            }
            _ => 1.0,
        };

        if step_progress >= 1.0 {
            self.sequence_step += 1;
            if self.sequence_step > 2 {
                self.sequence_step = 0;
                for leg in model.legs_mut() {
                    leg.stepper.park();
                    leg.poser.current_tip_position = leg.stepper.default_tip_position;
                }
                return 1.0;
            }
            return self.sequence_step as f64 / 3.0;
        }

        (self.sequence_step as f64 + step_progress) / 3.0
    }

    /// Choreographed sit-down: step each tripod group back to the ready
    /// stance footprint, then lower the body onto it.
    pub fn shut_down_sequence(&mut self, model: &mut Model, walker: &WalkController) -> f64 {
        let time_delta = self.time_delta();
        let duration = 1.0 / walker.step_frequency();
        let lift = walker.step_clearance_height();

        let step_progress = match self.sequence_step {
            // Step each tripod group to the ready footprint at walking depth
            0 | 1 => {
                let group = self.sequence_step;
                let mut progress = 1.0f64;
                for leg in model.legs_mut() {
                    if leg.id_number() % 2 != group {
                        continue;
                    }
                    let ready = ready_tip_position(leg);
                    let target = Vector3::new(
                        ready.x,
                        ready.y,
                        leg.stepper.default_tip_position.z,
                    );
                    progress = progress
                        .min(leg.poser.step_to_position(target, lift, duration, time_delta));
                }
                self.apply_sequence_ik(model);
                progress
            }
            // Lower the body onto the ready stance
            2 => {
                let mut progress = 1.0f64;
                for leg in model.legs_mut() {
                    let ready = ready_tip_position(leg);
                    progress = progress
                        .min(leg.poser.step_to_position(ready, 0.0, duration, time_delta));
                }
                self.apply_sequence_ik(model);
                progress
            }
            _ => 1.0,
        };

        if step_progress >= 1.0 {
            self.sequence_step += 1;
            if self.sequence_step > 2 {
                self.sequence_step = 0;
                for leg in model.legs_mut() {
                    let ready = ready_tip_position(leg);
                    leg.stepper.step_state = StepState::ForceStop;
                    leg.stepper.current_tip_position = ready;
                    leg.poser.current_tip_position = ready;
                }
                return 1.0;
            }
            return self.sequence_step as f64 / 3.0;
        }

        (self.sequence_step as f64 + step_progress) / 3.0
    }

    /// Step each tripod group to the (re-derived) default stance after a
    /// parameter adjustment.
    pub fn step_to_new_stance(&mut self, model: &mut Model, walker: &WalkController) -> f64 {
        let time_delta = self.time_delta();
        let duration = 1.0 / walker.step_frequency();
        let lift = walker.step_clearance_height();

        let group = self.sequence_step;
        let mut step_progress = 1.0f64;
        for leg in model.legs_mut() {
            if leg.id_number() % 2 != group {
                continue;
            }
            let target = leg.stepper.default_tip_position;
            step_progress = step_progress
                .min(leg.poser.step_to_position(target, lift, duration, time_delta));
        }
        self.apply_sequence_ik(model);

        if step_progress >= 1.0 {
            self.sequence_step += 1;
            if self.sequence_step > 1 {
                self.sequence_step = 0;
                for leg in model.legs_mut() {
                    leg.stepper.park();
                    leg.poser.current_tip_position = leg.stepper.default_tip_position;
                }
                return 1.0;
            }
            return self.sequence_step as f64 / 2.0;
        }

        (self.sequence_step as f64 + step_progress) / 2.0
    }

    /// Pose the body and the transitioning leg for a manual takeover or
    /// release. Shifts the body away from the leg so the CoM stays over the
    /// reduced support polygon, while raising (or lowering) the leg tip.
    pub fn pose_for_leg_manipulation(
        &mut self,
        model: &mut Model,
        walker: &WalkController,
        leg_id: usize,
    ) -> f64 {
        let time_delta = self.time_delta();
        let duration = 1.0 / walker.step_frequency();
        let lift = 0.5 * walker.step_clearance_height();

        let shift_magnitude = 0.5 * self.max_translation_xy();

        let leg = match model.leg_by_id_mut(leg_id) {
            Some(l) => l,
            None => return 0.0,
        };

        let to_manual = leg.leg_state() == LegState::WalkingToManual;
        let default = leg.stepper.default_tip_position;
        let raised = default + Vector3::new(0.0, 0.0, lift);

        let planar = Vector2::new(default.x, default.y);
        let away = if planar.norm() > 1e-9 {
            -planar / planar.norm()
        } else {
            Vector2::zeros()
        };

        let target_tip = if to_manual { raised } else { default };
        let progress = leg
            .poser
            .step_to_position(target_tip, lift, duration, time_delta);

        // Body shift tracks the leg transition
        let shift_fraction = if to_manual { progress } else { 1.0 - progress };
        self.manipulation_translation = Vector3::new(
            away.x * shift_magnitude * shift_fraction,
            away.y * shift_magnitude * shift_fraction,
            0.0,
        );

        if progress >= 1.0 {
            let leg = model.leg_by_id_mut(leg_id).unwrap();
            if to_manual {
                leg.stepper.current_tip_position = raised;
            } else {
                leg.stepper.park();
                leg.poser.current_tip_position = leg.stepper.default_tip_position;
                self.manipulation_translation = Vector3::zeros();
            }
        }

        // Re-pose the grounded legs against the shifted body and solve IK
        let pose = self.current_pose();
        for leg in model.legs_mut() {
            if leg.id_number() != leg_id {
                leg.poser.current_tip_position =
                    pose.inverse_transform_vector(&leg.stepper.current_tip_position);
            }
            let tip = leg.poser.current_tip_position;
            leg.set_desired_tip_position(tip);
            leg.apply_ik(true);
        }

        progress
    }

    // ---- PRIVATE FUNCTIONS ----

    /// Joint-space interpolation of every joint to its packed or unpacked
    /// position over `duration` seconds.
    fn move_joints_to(&mut self, model: &mut Model, target: JointTarget, duration: f64) -> f64 {
        if self.joint_move.is_none() {
            let origins = model
                .legs()
                .iter()
                .map(|leg| leg.joints().iter().map(|j| j.desired_position).collect())
                .collect();
            self.joint_move = Some(JointMove {
                origins,
                elapsed: 0.0,
            });
        }

        let time_delta = self.time_delta();
        let mv = self.joint_move.as_mut().unwrap();
        mv.elapsed += time_delta;
        let progress = clamp(mv.elapsed / duration, 0.0, 1.0);

        for (leg, origins) in model.legs_mut().iter_mut().zip(mv.origins.iter()) {
            for (joint, origin) in leg.joints_mut().iter_mut().zip(origins.iter()) {
                let end = match target {
                    JointTarget::Packed => joint.packed_position,
                    JointTarget::Unpacked => joint.unpacked_position,
                };
                joint.desired_position = clamp(
                    smooth_step(*origin, end, progress),
                    joint.min_position,
                    joint.max_position,
                );
            }
        }

        if progress >= 1.0 {
            self.joint_move = None;
            self.sync_tip_state(model);
        }

        progress
    }

    /// Solve IK for every leg from its poser tip. Used while a choreography
    /// owns the tip positions and the running pipeline is not active.
    fn apply_sequence_ik(&mut self, model: &mut Model) {
        for leg in model.legs_mut() {
            let tip = leg.poser.current_tip_position;
            leg.set_desired_tip_position(tip);
            leg.apply_ik(true);
        }
    }

    /// Re-derive the tip state from the joint demands after a joint-space
    /// move.
    fn sync_tip_state(&mut self, model: &mut Model) {
        for leg in model.legs_mut() {
            let positions = [
                leg.joints()[0].desired_position,
                leg.joints()[1].desired_position,
                leg.joints()[2].desired_position,
            ];
            let tip = leg.forward_kinematics(&positions);
            leg.set_desired_tip_position(tip);
            leg.stepper.current_tip_position = tip;
            leg.poser.current_tip_position = tip;
        }
    }

    fn max_translation_xy(&self) -> f64 {
        self.max_translation.x.min(self.max_translation.y)
    }
}

/// The ready stance tip position of a leg: where its tip sits with the
/// joints at their unpacked positions.
fn ready_tip_position(leg: &crate::model::Leg) -> Vector3<f64> {
    let positions = [
        leg.joints()[0].unpacked_position,
        leg.joints()[1].unpacked_position,
        leg.joints()[2].unpacked_position,
    ];
    leg.forward_kinematics(&positions)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Model;
    use crate::params::test_params;
    use crate::walk_ctrl::WalkController;

    fn setup() -> (PoseController, WalkController, Model) {
        let params = test_params();
        let mut model = Model::new(&params).unwrap();
        model.init_legs(true);
        let walker = WalkController::new(&params, &mut model).unwrap();
        (PoseController::new(&params), walker, model)
    }

    fn run_to_completion<F>(mut step: F, max_ticks: usize) -> usize
    where
        F: FnMut() -> f64,
    {
        for tick in 0..max_ticks {
            let progress = step();
            assert!((0.0..=1.0).contains(&progress));
            if progress >= 1.0 {
                return tick + 1;
            }
        }
        panic!("sequence did not complete within {} ticks", max_ticks);
    }

    #[test]
    fn test_pack_then_unpack_round_trip() {
        let (mut poser, _walker, mut model) = setup();

        run_to_completion(|| poser.pack_legs(&mut model, 2.0), 200);
        for leg in model.legs() {
            for joint in leg.joints() {
                assert!((joint.desired_position - joint.packed_position).abs() < 1e-9);
            }
        }

        run_to_completion(|| poser.unpack_legs(&mut model, 2.0), 200);
        for leg in model.legs() {
            for joint in leg.joints() {
                assert!((joint.desired_position - joint.unpacked_position).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_direct_startup_reaches_default_stance() {
        let (mut poser, walker, mut model) = setup();

        run_to_completion(|| poser.direct_startup(&mut model, &walker), 500);

        for leg in model.legs() {
            let offset = leg.local_tip_position() - leg.stepper.default_tip_position;
            assert!(
                offset.norm() < 1e-6,
                "leg {} ended {:?} from its default",
                leg.id_name(),
                offset.norm()
            );
        }
    }

    #[test]
    fn test_start_up_sequence_keeps_three_legs_grounded() {
        let (mut poser, walker, mut model) = setup();

        // Start from the ready stance
        run_to_completion(|| poser.unpack_legs(&mut model, 2.0), 200);

        let mut done = false;
        let mut ticks = 0;
        while !done {
            ticks += 1;
            assert!(ticks < 2000, "startup did not complete");
            let progress = poser.start_up_sequence(&mut model, &walker);
            done = progress >= 1.0;

            // A tip is grounded if it sits at the lowest tip level
            let lowest = model
                .legs()
                .iter()
                .map(|l| l.poser.current_tip_position.z)
                .fold(f64::INFINITY, f64::min);
            let grounded = model
                .legs()
                .iter()
                .filter(|l| (l.poser.current_tip_position.z - lowest).abs() < 1e-6)
                .count();
            assert!(grounded >= 3, "only {} legs grounded", grounded);
        }

        for leg in model.legs() {
            let offset =
                leg.poser.current_tip_position - leg.stepper.default_tip_position;
            assert!(offset.norm() < 1e-9);
        }
    }

    #[test]
    fn test_shut_down_reaches_ready_stance() {
        let (mut poser, walker, mut model) = setup();

        run_to_completion(|| poser.unpack_legs(&mut model, 2.0), 200);
        run_to_completion(|| poser.start_up_sequence(&mut model, &walker), 2000);
        run_to_completion(|| poser.shut_down_sequence(&mut model, &walker), 2000);

        for leg in model.legs() {
            let ready = ready_tip_position(leg);
            assert!((leg.poser.current_tip_position - ready).norm() < 1e-6);
        }
    }

    #[test]
    fn test_step_to_new_stance_tracks_new_defaults() {
        let (mut poser, mut walker, mut model) = setup();
        let mut params = test_params();

        run_to_completion(|| poser.unpack_legs(&mut model, 2.0), 200);
        run_to_completion(|| poser.start_up_sequence(&mut model, &walker), 2000);

        // Shrink the leg span and re-derive the stance
        params.walk.leg_span_scale.value = 0.6;
        walker.init(&params, &mut model).unwrap();

        run_to_completion(|| poser.step_to_new_stance(&mut model, &walker), 2000);

        for leg in model.legs() {
            let offset =
                leg.poser.current_tip_position - leg.stepper.default_tip_position;
            assert!(offset.norm() < 1e-9);
        }
    }
}
