//! Pose controller module
//!
//! Maintains the body pose applied on top of the walker's tip trajectories.
//! The pose is the additive combination of manual posing, gait-phase-locked
//! auto compensation, IMU orientation compensation, inclination compensation
//! and impedance-driven height, all bounded by the configured pose limits.
//!
//! The controller also owns every multi-tick choreography (startup,
//! shutdown, packing, stance changes, leg manipulation); each one returns a
//! progress value in `[0, 1]` and is driven tick by tick by the state
//! controller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod poser;
mod sequences;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{UnitQuaternion, Vector3};

// Internal
pub use poser::*;

use crate::model::{LegState, Model, Pose};
use crate::params::{AutoCompensationParams, HexParams, PidGains};
use crate::walk_ctrl::{WalkController, WalkState};
use comms_if::tc::{PoseResetMode, PosingMode};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A rotated-and-offset IMU reading.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    pub orientation: UnitQuaternion<f64>,
    pub linear_acceleration: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

impl Default for ImuSample {
    fn default() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            linear_acceleration: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

/// State of a joint-space move (packing or unpacking).
pub(crate) struct JointMove {
    /// Per-leg, per-joint positions captured when the move started.
    pub origins: Vec<Vec<f64>>,
    pub elapsed: f64,
}

/// State of a straight-line tip-space move (direct startup).
pub(crate) struct DirectMove {
    /// Per-leg tip positions captured when the move started.
    pub origins: Vec<Vector3<f64>>,
    pub elapsed: f64,
}

/// The pose controller.
pub struct PoseController {
    time_delta: f64,

    // Compensation enables
    imu_compensation: bool,
    auto_compensation: bool,
    manual_compensation: bool,
    inclination_compensation: bool,
    impedance_height: bool,

    // Limits and gains
    max_translation: Vector3<f64>,
    max_translation_velocity: f64,
    max_rotation: f64,
    max_rotation_velocity: f64,
    rotation_gains: PidGains,
    translation_gains: PidGains,
    auto_comp: AutoCompensationParams,
    time_to_start: f64,

    // Mode state
    posing_mode: PosingMode,
    pose_reset_mode: PoseResetMode,

    // Pose components
    current_pose: Pose,
    prev_translation: Vector3<f64>,
    prev_rotation: Vector3<f64>,
    manual_translation: Vector3<f64>,
    manual_rotation: Vector3<f64>,
    translation_input: Vector3<f64>,
    rotation_input: Vector3<f64>,

    /// Body shift applied while a leg transitions in or out of MANUAL, to
    /// keep the CoM over the reduced support polygon.
    pub(crate) manipulation_translation: Vector3<f64>,

    // IMU compensation state
    imu: ImuSample,
    rotation_absement_error: Vector3<f64>,
    rotation_position_error: Vector3<f64>,
    rotation_velocity_error: Vector3<f64>,

    // Impedance-height compensation state
    translation_absement_error: Vector3<f64>,
    translation_position_error: Vector3<f64>,
    translation_velocity_error: Vector3<f64>,

    // Choreography state
    pub(crate) sequence_step: usize,
    pub(crate) joint_move: Option<JointMove>,
    pub(crate) direct_move: Option<DirectMove>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseController {
    pub fn new(params: &HexParams) -> Self {
        Self {
            time_delta: params.control.time_delta,
            imu_compensation: params.control.imu_compensation,
            auto_compensation: params.control.auto_compensation,
            manual_compensation: params.control.manual_compensation,
            inclination_compensation: params.control.inclination_compensation,
            impedance_height: params.control.impedance_control,
            max_translation: Vector3::from_column_slice(&params.pose.max_translation),
            max_translation_velocity: params.pose.max_translation_velocity,
            max_rotation: params.pose.max_rotation,
            max_rotation_velocity: params.pose.max_rotation_velocity,
            rotation_gains: params.pose.rotation_pid_gains,
            translation_gains: params.pose.translation_pid_gains,
            auto_comp: params.pose.auto_compensation_params,
            time_to_start: params.pose.time_to_start,
            posing_mode: PosingMode::NoPosing,
            pose_reset_mode: PoseResetMode::NoReset,
            current_pose: Pose::identity(),
            prev_translation: Vector3::zeros(),
            prev_rotation: Vector3::zeros(),
            manual_translation: Vector3::zeros(),
            manual_rotation: Vector3::zeros(),
            translation_input: Vector3::zeros(),
            rotation_input: Vector3::zeros(),
            manipulation_translation: Vector3::zeros(),
            imu: ImuSample::default(),
            rotation_absement_error: Vector3::zeros(),
            rotation_position_error: Vector3::zeros(),
            rotation_velocity_error: Vector3::zeros(),
            translation_absement_error: Vector3::zeros(),
            translation_position_error: Vector3::zeros(),
            translation_velocity_error: Vector3::zeros(),
            sequence_step: 0,
            joint_move: None,
            direct_move: None,
        }
    }

    // ---- ACCESSORS ----

    pub fn current_pose(&self) -> Pose {
        self.current_pose
    }

    pub fn posing_mode(&self) -> PosingMode {
        self.posing_mode
    }

    pub fn set_posing_mode(&mut self, mode: PosingMode) {
        self.posing_mode = mode;
    }

    pub fn pose_reset_mode(&self) -> PoseResetMode {
        self.pose_reset_mode
    }

    pub fn set_pose_reset_mode(&mut self, mode: PoseResetMode) {
        self.pose_reset_mode = mode;
    }

    /// Record the operator's pose intent, each axis in `[-1, 1]`.
    pub fn set_manual_pose_input(&mut self, translation: Vector3<f64>, rotation: Vector3<f64>) {
        self.translation_input = translation;
        self.rotation_input = rotation;
    }

    /// Record an IMU sample (already rotated into the body frame).
    pub fn set_imu_data(
        &mut self,
        orientation: UnitQuaternion<f64>,
        linear_acceleration: Vector3<f64>,
        angular_velocity: Vector3<f64>,
    ) {
        self.imu = ImuSample {
            orientation,
            linear_acceleration,
            angular_velocity,
        };
    }

    pub fn imu_data(&self) -> ImuSample {
        self.imu
    }

    pub fn rotation_absement_error(&self) -> Vector3<f64> {
        self.rotation_absement_error
    }

    pub fn rotation_position_error(&self) -> Vector3<f64> {
        self.rotation_position_error
    }

    pub fn rotation_velocity_error(&self) -> Vector3<f64> {
        self.rotation_velocity_error
    }

    pub fn translation_absement_error(&self) -> Vector3<f64> {
        self.translation_absement_error
    }

    pub fn translation_position_error(&self) -> Vector3<f64> {
        self.translation_position_error
    }

    pub fn translation_velocity_error(&self) -> Vector3<f64> {
        self.translation_velocity_error
    }

    pub(crate) fn time_delta(&self) -> f64 {
        self.time_delta
    }

    pub(crate) fn time_to_start(&self) -> f64 {
        self.time_to_start
    }

    // ---- CYCLIC PROCESSING ----

    /// Recombine every pose compensation component into `current_pose`.
    pub fn update_current_pose(&mut self, model: &mut Model, walker: &WalkController) {
        let dt = self.time_delta;

        // Manual posing input, gated by the posing mode
        if self.manual_compensation {
            let t_step = self.max_translation_velocity * dt;
            let r_step = self.max_rotation_velocity * dt;
            match self.posing_mode {
                PosingMode::NoPosing => (),
                PosingMode::XY => {
                    self.manual_translation.x += self.translation_input.x * t_step;
                    self.manual_translation.y += self.translation_input.y * t_step;
                }
                PosingMode::PitchRoll => {
                    self.manual_rotation.x += self.rotation_input.x * r_step;
                    self.manual_rotation.y += self.rotation_input.y * r_step;
                }
                PosingMode::ZYaw => {
                    self.manual_translation.z += self.translation_input.z * t_step;
                    self.manual_rotation.z += self.rotation_input.z * r_step;
                }
            }
            for i in 0..3 {
                self.manual_translation[i] = clamp(
                    self.manual_translation[i],
                    -self.max_translation[i],
                    self.max_translation[i],
                );
                self.manual_rotation[i] =
                    clamp(self.manual_rotation[i], -self.max_rotation, self.max_rotation);
            }
        }

        // Pose resets drive the manual components back to zero
        let immediate = self.apply_pose_reset();

        // Compose the components
        let mut translation = self.manual_translation + self.manipulation_translation;
        let mut rotation = self.manual_rotation;

        if self.auto_compensation && walker.walk_state() != WalkState::Stopped {
            let phase = walker.cycle_fraction() * std::f64::consts::TAU;
            rotation.x += self.auto_comp.roll_amplitude * phase.sin();
            rotation.y += self.auto_comp.pitch_amplitude * (2.0 * phase).sin();
            translation.z += self.auto_comp.z_translation_amplitude * (2.0 * phase).sin();
        }

        if self.imu_compensation {
            let (roll, pitch, _) = self.imu.orientation.euler_angles();
            self.rotation_position_error = Vector3::new(roll, pitch, 0.0);
            self.rotation_velocity_error =
                Vector3::new(self.imu.angular_velocity.x, self.imu.angular_velocity.y, 0.0);
            for i in 0..2 {
                self.rotation_absement_error[i] = clamp(
                    self.rotation_absement_error[i] + self.rotation_position_error[i] * dt,
                    -self.max_rotation,
                    self.max_rotation,
                );
            }

            rotation.x -= self.rotation_gains.absement * self.rotation_absement_error.x
                + self.rotation_gains.position * self.rotation_position_error.x
                + self.rotation_gains.velocity * self.rotation_velocity_error.x;
            rotation.y -= self.rotation_gains.absement * self.rotation_absement_error.y
                + self.rotation_gains.position * self.rotation_position_error.y
                + self.rotation_gains.velocity * self.rotation_velocity_error.y;
        }

        if self.inclination_compensation {
            let (roll, pitch, _) = self.imu.orientation.euler_angles();
            translation.x += walker.body_height() * pitch.tan();
            translation.y -= walker.body_height() * roll.tan();
        }

        // Impedance-driven height: hold the average vertical deflection at
        // zero so terrain contact does not sink or lift the body
        if self.impedance_height {
            let walking: Vec<&crate::model::Leg> = model
                .legs()
                .iter()
                .filter(|l| l.leg_state() == LegState::Walking)
                .collect();
            if !walking.is_empty() {
                let mean_dz =
                    walking.iter().map(|l| l.delta_z()).sum::<f64>() / walking.len() as f64;
                let prev_err = self.translation_position_error.z;
                self.translation_position_error = Vector3::new(0.0, 0.0, mean_dz);
                self.translation_absement_error.z = clamp(
                    self.translation_absement_error.z + mean_dz * dt,
                    -self.max_translation.z,
                    self.max_translation.z,
                );
                self.translation_velocity_error =
                    Vector3::new(0.0, 0.0, (mean_dz - prev_err) / dt);

                translation.z -= self.translation_gains.absement
                    * self.translation_absement_error.z
                    + self.translation_gains.position * self.translation_position_error.z
                    + self.translation_gains.velocity * self.translation_velocity_error.z;
            }
        }

        // Bound the combined pose
        for i in 0..3 {
            translation[i] = clamp(
                translation[i],
                -self.max_translation[i],
                self.max_translation[i],
            );
            rotation[i] = clamp(rotation[i], -self.max_rotation, self.max_rotation);
        }

        // Bound the pose velocity, except for immediate resets
        if !immediate {
            let t_step = self.max_translation_velocity * dt;
            let t_delta = translation - self.prev_translation;
            if t_delta.norm() > t_step {
                translation = self.prev_translation + t_delta * (t_step / t_delta.norm());
            }
            let r_step = self.max_rotation_velocity * dt;
            let r_delta = rotation - self.prev_rotation;
            if r_delta.norm() > r_step {
                rotation = self.prev_rotation + r_delta * (r_step / r_delta.norm());
            }
        }

        self.prev_translation = translation;
        self.prev_rotation = rotation;
        self.current_pose =
            Pose::from_euler(translation, rotation.x, rotation.y, rotation.z);
        model.set_current_pose(self.current_pose);
    }

    /// Copy the posed tip position of every leg into its poser.
    pub fn update_stance(&mut self, model: &mut Model) {
        let pose = self.current_pose;
        for leg in model.legs_mut() {
            leg.poser.current_tip_position =
                pose.inverse_transform_vector(&leg.stepper.current_tip_position);
        }
    }

    // ---- PRIVATE FUNCTIONS ----

    /// Apply the active pose reset mode. Returns true if the reset is
    /// immediate (pose velocity limits are bypassed this tick).
    fn apply_pose_reset(&mut self) -> bool {
        let t_step = self.max_translation_velocity * self.time_delta;
        let r_step = self.max_rotation_velocity * self.time_delta;

        let decay = |value: &mut f64, step: f64| {
            if value.abs() <= step {
                *value = 0.0;
            } else {
                *value -= value.signum() * step;
            }
        };

        match self.pose_reset_mode {
            PoseResetMode::NoReset => false,
            PoseResetMode::ZAndYawReset => {
                decay(&mut self.manual_translation.z, t_step);
                decay(&mut self.manual_rotation.z, r_step);
                if self.manual_translation.z == 0.0 && self.manual_rotation.z == 0.0 {
                    self.pose_reset_mode = PoseResetMode::NoReset;
                }
                false
            }
            PoseResetMode::XAndYReset => {
                decay(&mut self.manual_translation.x, t_step);
                decay(&mut self.manual_translation.y, t_step);
                if self.manual_translation.x == 0.0 && self.manual_translation.y == 0.0 {
                    self.pose_reset_mode = PoseResetMode::NoReset;
                }
                false
            }
            PoseResetMode::PitchAndRollReset => {
                decay(&mut self.manual_rotation.x, r_step);
                decay(&mut self.manual_rotation.y, r_step);
                if self.manual_rotation.x == 0.0 && self.manual_rotation.y == 0.0 {
                    self.pose_reset_mode = PoseResetMode::NoReset;
                }
                false
            }
            PoseResetMode::AllReset => {
                for i in 0..3 {
                    decay(&mut self.manual_translation[i], t_step);
                    decay(&mut self.manual_rotation[i], r_step);
                }
                if self.manual_translation == Vector3::zeros()
                    && self.manual_rotation == Vector3::zeros()
                {
                    self.pose_reset_mode = PoseResetMode::NoReset;
                }
                false
            }
            PoseResetMode::ImmediateAllReset => {
                self.manual_translation = Vector3::zeros();
                self.manual_rotation = Vector3::zeros();
                true
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::test_params;

    fn setup() -> (PoseController, WalkController, Model) {
        let params = test_params();
        let mut model = Model::new(&params).unwrap();
        model.init_legs(true);
        let walker = WalkController::new(&params, &mut model).unwrap();
        for leg in model.legs_mut() {
            leg.stepper.park();
        }
        (PoseController::new(&params), walker, model)
    }

    #[test]
    fn test_update_stance_applies_pose_inverse() {
        let (mut poser, walker, mut model) = setup();

        // Drive a manual z translation in
        poser.set_posing_mode(PosingMode::ZYaw);
        poser.set_manual_pose_input(Vector3::new(0.0, 0.0, 1.0), Vector3::zeros());
        for _ in 0..200 {
            poser.update_current_pose(&mut model, &walker);
        }
        let pose = poser.current_pose();
        assert!(pose.position.z > 0.0);

        poser.update_stance(&mut model);
        for leg in model.legs() {
            let expected =
                pose.inverse_transform_vector(&leg.stepper.current_tip_position);
            assert!((leg.poser.current_tip_position - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn test_manual_pose_clamped_to_limits() {
        let (mut poser, walker, mut model) = setup();

        poser.set_posing_mode(PosingMode::ZYaw);
        poser.set_manual_pose_input(Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 1.0));

        // Saturate well past the limit
        for _ in 0..2000 {
            poser.update_current_pose(&mut model, &walker);
        }

        let pose = poser.current_pose();
        assert!(pose.position.z <= poser.max_translation.z + 1e-12);
        let (_, _, yaw) = pose.euler_angles();
        assert!(yaw <= poser.max_rotation + 1e-9);
    }

    #[test]
    fn test_posing_mode_gates_axes() {
        let (mut poser, walker, mut model) = setup();

        // XY mode must ignore z translation input
        poser.set_posing_mode(PosingMode::XY);
        poser.set_manual_pose_input(Vector3::new(1.0, 0.0, 1.0), Vector3::zeros());
        for _ in 0..100 {
            poser.update_current_pose(&mut model, &walker);
        }

        let pose = poser.current_pose();
        assert!(pose.position.x > 0.0);
        assert_eq!(pose.position.z, 0.0);
    }

    #[test]
    fn test_immediate_reset_zeroes_manual_pose() {
        let (mut poser, walker, mut model) = setup();

        poser.set_posing_mode(PosingMode::XY);
        poser.set_manual_pose_input(Vector3::new(1.0, 1.0, 0.0), Vector3::zeros());
        for _ in 0..100 {
            poser.update_current_pose(&mut model, &walker);
        }
        assert!(poser.current_pose().position.x > 0.0);

        poser.set_manual_pose_input(Vector3::zeros(), Vector3::zeros());
        poser.set_pose_reset_mode(PoseResetMode::ImmediateAllReset);
        poser.update_current_pose(&mut model, &walker);

        assert_eq!(poser.current_pose().position, Vector3::zeros());
    }

    #[test]
    fn test_gradual_reset_clears_mode_when_done() {
        let (mut poser, walker, mut model) = setup();

        poser.set_posing_mode(PosingMode::ZYaw);
        poser.set_manual_pose_input(Vector3::new(0.0, 0.0, 1.0), Vector3::zeros());
        for _ in 0..100 {
            poser.update_current_pose(&mut model, &walker);
        }

        poser.set_manual_pose_input(Vector3::zeros(), Vector3::zeros());
        poser.set_pose_reset_mode(PoseResetMode::ZAndYawReset);
        for _ in 0..200 {
            poser.update_current_pose(&mut model, &walker);
        }

        assert_eq!(poser.current_pose().position.z, 0.0);
        assert_eq!(poser.pose_reset_mode(), PoseResetMode::NoReset);
    }
}
