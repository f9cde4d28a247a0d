//! Command and sensor intake
//!
//! The teleoperation and sensor surfaces write into the state controller
//! through these methods. Each applies the state gating rules: inputs that
//! are not meaningful in the current system state are silently ignored,
//! requests that are meaningful but cannot be honoured are rejected with a
//! warning.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::{UnitQuaternion, Vector2, Vector3};

// Internal
use super::StateController;
use comms_if::eqpt::{ImuData, JointStateData, TipForceData};
use comms_if::tc::{
    AutoNavigationMode, CruiseControlMode, GaitDesignation, ParameterSelection, PoseResetMode,
    PosingMode, SystemState, LEG_UNDESIGNATED,
};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StateController {
    // ---- TELEOPERATION INPUTS ----

    /// Desired body velocity input.
    pub fn body_velocity_input(&mut self, linear_x: f64, linear_y: f64, angular_z: f64) {
        if self.auto_navigation_mode == AutoNavigationMode::On {
            return;
        }
        self.linear_velocity_input = Vector2::new(linear_x, linear_y);
        self.angular_velocity_input = angular_z;
    }

    /// Desired tip velocity for the primary manual slot.
    pub fn primary_tip_velocity_input(&mut self, x: f64, y: f64, z: f64) {
        self.primary_tip_velocity_input = Vector3::new(x, y, z);
    }

    /// Desired tip velocity for the secondary manual slot.
    pub fn secondary_tip_velocity_input(&mut self, x: f64, y: f64, z: f64) {
        self.secondary_tip_velocity_input = Vector3::new(x, y, z);
    }

    /// Manual body pose intent.
    pub fn body_pose_input(&mut self, translation: Vector3<f64>, rotation: Vector3<f64>) {
        if self.system_state != SystemState::WaitingForUser {
            self.poser.set_manual_pose_input(translation, rotation);
        }
    }

    /// Desired system state input.
    pub fn system_state_input(&mut self, input: SystemState) {
        if self.system_state == SystemState::WaitingForUser {
            self.new_system_state = input;
            self.user_input_flag = true;
            return;
        }

        let mut target = input;
        if !self.params.pose.start_up_sequence
            && matches!(input, SystemState::Ready | SystemState::Packed)
        {
            target = SystemState::Off;
        }
        self.new_system_state = target;

        if self.new_system_state != self.system_state {
            self.transition_state_flag = true;
        }
    }

    /// Gait selection input.
    pub fn gait_selection_input(&mut self, selection: GaitDesignation) {
        if self.system_state != SystemState::Running {
            return;
        }
        if selection != self.gait_selection && selection != GaitDesignation::Undesignated {
            self.gait_selection = selection;
            self.gait_change_flag = true;
        }
    }

    /// Posing mode input.
    pub fn posing_mode_input(&mut self, mode: PosingMode) {
        if self.system_state != SystemState::Running {
            return;
        }
        if mode != self.poser.posing_mode() {
            self.poser.set_posing_mode(mode);
            match mode {
                PosingMode::NoPosing => info!(
                    "Posing mode set to NO_POSING. Body will not respond to manual posing input \
                     (except for reset commands)."
                ),
                PosingMode::XY => info!(
                    "Posing mode set to X_Y. Body will only respond to x/y translational manual \
                     posing input."
                ),
                PosingMode::PitchRoll => info!(
                    "Posing mode set to PITCH_ROLL. Body will only respond to pitch/roll \
                     rotational manual posing input."
                ),
                PosingMode::ZYaw => info!(
                    "Posing mode set to Z_YAW. Body will only respond to z translational and yaw \
                     rotational manual posing input."
                ),
            }
        }
    }

    /// Cruise control mode input.
    pub fn cruise_control_input(&mut self, mode: CruiseControlMode) {
        if self.system_state != SystemState::Running {
            return;
        }
        if mode == self.cruise_control_mode {
            return;
        }
        self.cruise_control_mode = mode;

        match mode {
            CruiseControlMode::On => {
                if self.params.walk.force_cruise_velocity {
                    self.linear_cruise_velocity =
                        Vector2::from_column_slice(&self.params.walk.linear_cruise_velocity);
                    self.angular_cruise_velocity = self.params.walk.angular_cruise_velocity;
                } else {
                    self.linear_cruise_velocity = self.linear_velocity_input;
                    self.angular_cruise_velocity = self.angular_velocity_input;
                }
                info!(
                    "Cruise control ON - Input velocity set to constant: Linear(X:Y): {}:{}, \
                     Angular(Z): {}",
                    self.linear_cruise_velocity.x,
                    self.linear_cruise_velocity.y,
                    self.angular_cruise_velocity
                );
            }
            CruiseControlMode::Off => {
                info!("Cruise control OFF - Input velocity set by user.");
            }
        }
    }

    /// Auto navigation mode input.
    pub fn auto_navigation_input(&mut self, mode: AutoNavigationMode) {
        if self.system_state != SystemState::Running {
            return;
        }
        if mode != self.auto_navigation_mode {
            self.auto_navigation_mode = mode;
            match mode {
                AutoNavigationMode::On => {
                    info!("Auto Navigation mode ON. User input is being ignored.")
                }
                AutoNavigationMode::Off => {
                    info!("Auto Navigation mode OFF. Control returned to user input.")
                }
            }
        }
    }

    /// Parameter selection input.
    pub fn parameter_selection_input(&mut self, selection: ParameterSelection) {
        if self.system_state != SystemState::Running {
            return;
        }
        if selection != self.parameter_selection {
            self.parameter_selection = selection;
            match self.params.selected(selection) {
                Some(p) => info!("{} parameter currently selected.", p.name),
                None => info!("No parameter currently selected."),
            }
        }
    }

    /// Parameter adjustment input: -1 decrement, 0 idle, +1 increment.
    pub fn parameter_adjust_input(&mut self, direction: i8) {
        if self.system_state != SystemState::Running {
            return;
        }
        if direction != 0
            && !self.parameter_adjust_flag
            && self.parameter_selection != ParameterSelection::NoSelection
        {
            if let Some(p) = self.params.select(self.parameter_selection) {
                p.set_direction(direction);
            }
            self.parameter_adjust_flag = true;
        }
    }

    /// Primary manual slot leg selection input.
    pub fn primary_leg_selection_input(&mut self, leg: i8) {
        if self.system_state != SystemState::Running {
            return;
        }
        let selection = self.decode_leg_selection(leg);
        if selection != self.primary_leg_selection {
            self.primary_leg_selection = selection;
            match selection {
                Some(id) => info!(
                    "{} leg selected for primary control.",
                    self.model.leg_by_id(id).unwrap().id_name()
                ),
                None => info!("No leg currently selected for primary control."),
            }
        }
    }

    /// Secondary manual slot leg selection input.
    pub fn secondary_leg_selection_input(&mut self, leg: i8) {
        if self.system_state != SystemState::Running {
            return;
        }
        let selection = self.decode_leg_selection(leg);
        if selection != self.secondary_leg_selection {
            self.secondary_leg_selection = selection;
            match selection {
                Some(id) => info!(
                    "{} leg selected for secondary control.",
                    self.model.leg_by_id(id).unwrap().id_name()
                ),
                None => info!("No leg currently selected for secondary control."),
            }
        }
    }

    /// Toggle the primary-slot leg between WALKING and MANUAL.
    pub fn primary_leg_state_toggle_input(&mut self) {
        if self.system_state != SystemState::Running {
            return;
        }
        if self.primary_leg_selection.is_none() {
            info!("Cannot toggle primary leg state as no leg is currently selected as primary.");
        } else if self.toggle_secondary_leg_state {
            self.info_throttled(format_args!(
                "Cannot toggle primary leg state as secondary leg is currently transitioning \
                 states. Please wait and try again."
            ));
        } else {
            self.toggle_primary_leg_state = true;
        }
    }

    /// Toggle the secondary-slot leg between WALKING and MANUAL.
    pub fn secondary_leg_state_toggle_input(&mut self) {
        if self.system_state != SystemState::Running {
            return;
        }
        if self.secondary_leg_selection.is_none() {
            info!(
                "Cannot toggle secondary leg state as no leg is currently selected as secondary."
            );
        } else if self.toggle_primary_leg_state {
            self.info_throttled(format_args!(
                "Cannot toggle secondary leg state as primary leg is currently transitioning \
                 states. Please wait and try again."
            ));
        } else {
            self.toggle_secondary_leg_state = true;
        }
    }

    /// Pose reset mode input.
    pub fn pose_reset_input(&mut self, mode: PoseResetMode) {
        if self.system_state == SystemState::WaitingForUser {
            return;
        }
        if self.poser.pose_reset_mode() == PoseResetMode::ImmediateAllReset
            && mode != PoseResetMode::ImmediateAllReset
        {
            warn!("Pose reset rejected while a leg manipulation reset is in force.");
            return;
        }
        self.poser.set_pose_reset_mode(mode);
    }

    // ---- SENSOR INPUTS ----

    /// IMU sample input. The raw reading is rotated by the configured
    /// mounting offset before use.
    pub fn imu_input(&mut self, data: &ImuData) {
        let offset = self.params.control.imu_rotation_offset;
        let imu_rotation_offset =
            UnitQuaternion::from_euler_angles(offset[0], offset[1], offset[2]);

        let raw_orientation = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
            data.orientation[0],
            data.orientation[1],
            data.orientation[2],
            data.orientation[3],
        ));
        let raw_linear_acceleration = Vector3::from_column_slice(&data.linear_acceleration);
        let raw_angular_velocity = Vector3::from_column_slice(&data.angular_velocity);

        self.poser.set_imu_data(
            imu_rotation_offset * raw_orientation * imu_rotation_offset.inverse(),
            imu_rotation_offset * raw_linear_acceleration,
            imu_rotation_offset * raw_angular_velocity,
        );
    }

    /// Joint state input: parallel arrays keyed by joint name. Velocity and
    /// effort are optional; absent arrays leave the previous values.
    pub fn joint_states_input(&mut self, data: &JointStateData) {
        let get_velocity_values = !data.velocity.is_empty();
        let get_effort_values = !data.effort.is_empty();

        for (i, name) in data.name.iter().enumerate() {
            for leg in self.model.legs_mut() {
                for joint in leg.joints_mut() {
                    if joint.name != *name {
                        continue;
                    }
                    if let Some(&position) = data.position.get(i) {
                        joint.current_position = position - joint.position_offset;
                        joint.position_initialised = true;
                    }
                    if get_velocity_values {
                        if let Some(&velocity) = data.velocity.get(i) {
                            joint.current_velocity = velocity;
                        }
                    }
                    if get_effort_values {
                        if let Some(&effort) = data.effort.get(i) {
                            joint.current_effort = effort;
                        }
                    }
                }
            }
        }
    }

    /// Raw tip force input: entry `2 * leg_id` of the effort array carries
    /// the vertical channel for each leg.
    pub fn tip_force_input(&mut self, data: &TipForceData) {
        let force_offset = self.params.impedance.force_offset;
        let max_force = self.params.impedance.max_force;

        for leg in self.model.legs_mut() {
            let index = 2 * leg.id_number();
            if let Some(&raw) = data.effort.get(index) {
                leg.set_tip_force(clamp(raw - force_offset, 0.0, max_force));
            }
        }
    }

    // ---- PRIVATE HELPERS ----

    fn decode_leg_selection(&self, leg: i8) -> Option<usize> {
        if leg == LEG_UNDESIGNATED {
            return None;
        }
        let id = leg as usize;
        if leg >= 0 && id < self.model.leg_count() {
            Some(id)
        } else {
            warn!("Leg selection {} is not a valid leg ID.", leg);
            None
        }
    }
}
