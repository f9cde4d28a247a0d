//! State controller module
//!
//! Top-level state machine and tick orchestrator. Owns the model, the three
//! sub-controllers and the parameter tree; sequences the robot between
//! lifecycle states and runs the four-stage control pipeline
//! (walk -> pose -> impedance -> IK) every tick while RUNNING.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod intake;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::{Vector2, Vector3};
use serde::Serialize;
use thiserror::Error;

// Internal
use crate::impedance_ctrl::ImpedanceController;
use crate::model::{LegState, Model};
use crate::params::{affects_stance, gait_designation, HexParams};
use crate::pose_ctrl::PoseController;
use crate::walk_ctrl::{WalkController, WalkState};
use comms_if::eqpt::ServoDems;
use comms_if::tc::{
    AutoNavigationMode, CruiseControlMode, GaitDesignation, ParameterSelection, PoseResetMode,
    SystemState,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of legs allowed in a manual-associated state at once.
pub const MAX_MANUAL_LEGS: usize = 2;

/// Tolerance used when checking joints against their packed positions.
const PACKED_TOLERANCE_RAD: f64 = 0.01;

/// Period of throttled informational logs in seconds.
const THROTTLE_PERIOD_S: f64 = 5.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Unrecoverable conditions. The tick propagates these to `main`, which logs
/// and aborts the process.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(
        "Hexapod is in the packed state and cannot run a direct startup. Either manually \
         unpack the hexapod or set start_up_sequence to true in the parameter file")]
    PackedWithoutStartupSequence,

    #[error("Undefined system state transition was requested: {from:?} -> {to:?}")]
    UndefinedTransition { from: SystemState, to: SystemState },
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One row of the per-leg state archive.
#[derive(Debug, Clone, Serialize)]
pub struct LegStateRecord {
    pub time_s: f64,
    pub leg_name: String,
    pub walker_tip_x: f64,
    pub walker_tip_y: f64,
    pub walker_tip_z: f64,
    pub poser_tip_x: f64,
    pub poser_tip_y: f64,
    pub poser_tip_z: f64,
    pub swing_progress: f64,
    pub stance_progress: f64,
    pub tip_force: f64,
    pub delta_z: f64,
    pub virtual_stiffness: f64,
}

/// The state controller.
pub struct StateController {
    params: HexParams,

    model: Model,
    walker: WalkController,
    poser: PoseController,
    impedance: ImpedanceController,

    system_state: SystemState,
    new_system_state: SystemState,

    gait_selection: GaitDesignation,
    cruise_control_mode: CruiseControlMode,
    auto_navigation_mode: AutoNavigationMode,
    parameter_selection: ParameterSelection,

    primary_leg_selection: Option<usize>,
    secondary_leg_selection: Option<usize>,
    manual_leg_count: usize,

    user_input_flag: bool,
    gait_change_flag: bool,
    toggle_primary_leg_state: bool,
    toggle_secondary_leg_state: bool,
    parameter_adjust_flag: bool,
    new_parameter_set: bool,
    transition_state_flag: bool,

    linear_velocity_input: Vector2<f64>,
    angular_velocity_input: f64,
    primary_tip_velocity_input: Vector3<f64>,
    secondary_tip_velocity_input: Vector3<f64>,
    linear_cruise_velocity: Vector2<f64>,
    angular_cruise_velocity: f64,

    tick_count: u64,
    throttle_ticks: u64,
    transition_tick_count: u64,
    transition_budget_warned: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StateController {
    /// Build the controller tree from a validated parameter set.
    pub fn new(params: HexParams) -> Result<Self, crate::model::ModelError> {
        let mut model = Model::new(&params)?;
        let walker = WalkController::new(&params, &mut model)
            .expect("parameters validated before construction");
        let poser = PoseController::new(&params);
        let impedance = ImpedanceController::new(&params, &mut model);

        let throttle_ticks = ((THROTTLE_PERIOD_S / params.control.time_delta) as u64).max(1);
        let gait_selection = gait_designation(&params.walk.gait_type);

        if params.pose.leg_manipulation_mode != "tip_control" {
            warn!(
                "Leg manipulation mode '{}' is not supported, falling back to tip_control.",
                params.pose.leg_manipulation_mode
            );
        }

        Ok(Self {
            params,
            model,
            walker,
            poser,
            impedance,
            system_state: SystemState::WaitingForUser,
            new_system_state: SystemState::WaitingForUser,
            gait_selection,
            cruise_control_mode: CruiseControlMode::Off,
            auto_navigation_mode: AutoNavigationMode::Off,
            parameter_selection: ParameterSelection::NoSelection,
            primary_leg_selection: None,
            secondary_leg_selection: None,
            manual_leg_count: 0,
            user_input_flag: false,
            gait_change_flag: false,
            toggle_primary_leg_state: false,
            toggle_secondary_leg_state: false,
            parameter_adjust_flag: false,
            new_parameter_set: false,
            transition_state_flag: false,
            linear_velocity_input: Vector2::zeros(),
            angular_velocity_input: 0.0,
            primary_tip_velocity_input: Vector3::zeros(),
            secondary_tip_velocity_input: Vector3::zeros(),
            linear_cruise_velocity: Vector2::zeros(),
            angular_cruise_velocity: 0.0,
            tick_count: 0,
            throttle_ticks,
            transition_tick_count: 0,
            transition_budget_warned: false,
        })
    }

    // ---- ACCESSORS ----

    pub fn params(&self) -> &HexParams {
        &self.params
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn walker(&self) -> &WalkController {
        &self.walker
    }

    pub fn poser(&self) -> &PoseController {
        &self.poser
    }

    pub fn system_state(&self) -> SystemState {
        self.system_state
    }

    pub fn new_system_state(&self) -> SystemState {
        self.new_system_state
    }

    pub fn transition_state_flag(&self) -> bool {
        self.transition_state_flag
    }

    pub fn gait_change_flag(&self) -> bool {
        self.gait_change_flag
    }

    pub fn parameter_adjust_flag(&self) -> bool {
        self.parameter_adjust_flag
    }

    pub fn manual_leg_count(&self) -> usize {
        self.manual_leg_count
    }

    pub fn joint_positions_initialised(&self) -> bool {
        self.model.joint_positions_initialised()
    }

    /// Initialise the model's legs, optionally assuming default joint
    /// positions when no sensor bus is connected.
    pub fn init_model(&mut self, use_default_joint_positions: bool) {
        self.model.init_legs(use_default_joint_positions);
    }

    // ---- CYCLIC PROCESSING ----

    /// Run one control tick.
    pub fn tick(&mut self) -> Result<(), FatalError> {
        self.tick_count += 1;

        match self.system_state {
            SystemState::WaitingForUser => {
                // Bootstrap: wait for the first user command and a full set
                // of joint positions before resolving the robot's state
                if self.user_input_flag && self.model.joint_positions_initialised() {
                    self.system_state = SystemState::Unknown;
                    self.transition_state_flag = self.new_system_state != self.system_state;
                }
                return Ok(());
            }
            SystemState::Unknown if !self.model.joint_positions_initialised() => {
                return Ok(());
            }
            _ => (),
        }

        if self.system_state != SystemState::Unknown {
            self.poser.update_current_pose(&mut self.model, &self.walker);
            if self.params.control.impedance_control {
                self.impedance_control();
            }
        }

        if self.transition_state_flag {
            self.transition_system_state()?;
        } else if self.system_state == SystemState::Running {
            self.running_state();
        }

        self.update_desired_joint_state();

        Ok(())
    }

    /// Impedance stage: modulate stiffness with the walk phase, then
    /// integrate every walking leg's virtual spring/damper.
    fn impedance_control(&mut self) {
        if self.walker.walk_state() != WalkState::Stopped && self.params.impedance.dynamic_stiffness
        {
            self.impedance.update_stiffness(&mut self.model);
        }
        self.impedance.update_all(&mut self.model);
    }

    /// Advance the active system-state transition by one tick.
    fn transition_system_state(&mut self) -> Result<(), FatalError> {
        self.transition_tick_count += 1;
        let start_up_sequence = self.params.pose.start_up_sequence;

        match (self.system_state, self.new_system_state) {
            // First entry resolves the unknown state from the joint sensors
            (SystemState::Unknown, _) => {
                let mut packed_joints = 0;
                let mut total_joints = 0;
                for leg in self.model.legs() {
                    for joint in leg.joints() {
                        total_joints += 1;
                        if (joint.current_position - joint.packed_position).abs()
                            < PACKED_TOLERANCE_RAD
                        {
                            packed_joints += 1;
                        }
                    }
                }

                if packed_joints == total_joints {
                    if !start_up_sequence {
                        return Err(FatalError::PackedWithoutStartupSequence);
                    }
                    self.system_state = SystemState::Packed;
                    info!("Hexapod currently packed.");
                } else if !start_up_sequence {
                    warn!(
                        "start_up_sequence parameter is set to false, ensure hexapod is off the \
                         ground before transitioning system state."
                    );
                    self.system_state = SystemState::Off;
                } else {
                    self.system_state = SystemState::Packed;
                    warn!(
                        "Hexapod state is unknown. Future state transitions may be undesirable, \
                         recommend ensuring hexapod is off the ground before proceeding."
                    );
                }
            }

            // These targets are never reachable by transition
            (from, to @ (SystemState::Unknown | SystemState::WaitingForUser | SystemState::Suspended)) => {
                return Err(FatalError::UndefinedTransition { from, to });
            }

            // OFF -> RUNNING with no startup choreography configured
            (SystemState::Off, SystemState::Running) if !start_up_sequence => {
                self.check_transition_budget(self.params.pose.time_to_start);
                let progress = self.poser.direct_startup(&mut self.model, &self.walker);
                self.info_throttled(format_args!(
                    "Hexapod transitioning directly to RUNNING state ({:.0}%)...",
                    progress * 100.0
                ));
                if progress >= 1.0 {
                    self.system_state = SystemState::Running;
                    info!("Direct startup sequence complete. Ready to walk.");
                }
            }

            // OFF -> anything else: bring the controller up in PACKED
            (SystemState::Off, to) if to != SystemState::Off => {
                self.system_state = SystemState::Packed;
                info!("Controller running.");
            }

            // PACKED -> OFF: suspend the controller
            (SystemState::Packed, SystemState::Off) => {
                self.system_state = SystemState::Off;
                info!("Controller suspended.");
            }

            // PACKED -> READY/RUNNING: unpack the legs
            (SystemState::Packed, SystemState::Ready | SystemState::Running) => {
                self.info_throttled(format_args!("Hexapod transitioning to READY state..."));
                let duration = 2.0 / self.params.walk.step_frequency.get();
                self.check_transition_budget(duration);
                let progress = self.poser.unpack_legs(&mut self.model, duration);
                if progress >= 1.0 {
                    self.system_state = SystemState::Ready;
                    info!("State transition complete. Hexapod is in READY state.");
                }
            }

            // READY -> PACKED/OFF: pack the legs
            (SystemState::Ready, SystemState::Packed | SystemState::Off) => {
                self.info_throttled(format_args!("Hexapod transitioning to PACKED state..."));
                let duration = 2.0 / self.params.walk.step_frequency.get();
                self.check_transition_budget(duration);
                let progress = self.poser.pack_legs(&mut self.model, duration);
                if progress >= 1.0 {
                    self.system_state = SystemState::Packed;
                    info!("State transition complete. Hexapod is in PACKED state.");
                }
            }

            // READY -> RUNNING: choreographed stand-up
            (SystemState::Ready, SystemState::Running) => {
                self.info_throttled(format_args!("Hexapod transitioning to RUNNING state..."));
                self.check_transition_budget(3.0 / self.params.walk.step_frequency.get());
                let progress = self.poser.start_up_sequence(&mut self.model, &self.walker);
                if progress >= 1.0 {
                    self.system_state = SystemState::Running;
                    info!(
                        "State transition complete. Hexapod is in RUNNING state. Ready to walk."
                    );
                }
            }

            // RUNNING -> OFF with no startup choreography: suspend directly
            (SystemState::Running, SystemState::Off) if !start_up_sequence => {
                self.system_state = SystemState::Off;
                info!("Controller suspended.");
            }

            // RUNNING -> anything else: choreographed sit-down to READY
            (SystemState::Running, to) if to != SystemState::Running => {
                self.info_throttled(format_args!("Hexapod transitioning to READY state..."));
                self.check_transition_budget(3.0 / self.params.walk.step_frequency.get());
                let progress = self.poser.shut_down_sequence(&mut self.model, &self.walker);
                if progress >= 1.0 {
                    self.system_state = SystemState::Ready;
                    info!("State transition complete. Hexapod is in READY state.");
                }
            }

            (from, to) => {
                return Err(FatalError::UndefinedTransition { from, to });
            }
        }

        // Transition complete
        if self.system_state == self.new_system_state {
            self.transition_state_flag = false;
            self.transition_tick_count = 0;
            self.transition_budget_warned = false;
        }

        Ok(())
    }

    /// The RUNNING pipeline.
    fn running_state(&mut self) {
        if self.gait_change_flag {
            self.change_gait();
        } else if self.parameter_adjust_flag {
            self.adjust_parameter();
        } else if self.toggle_primary_leg_state || self.toggle_secondary_leg_state {
            self.leg_state_toggle();
        } else if self.cruise_control_mode == CruiseControlMode::On {
            self.linear_velocity_input = self.linear_cruise_velocity;
            self.angular_velocity_input = self.angular_cruise_velocity;
        }

        // While a gait switch, parameter adjustment or leg-state transition
        // is in progress with the walker stopped, the choreography owns the
        // tip positions and the pipeline stands down.
        let action_pending = self.gait_change_flag
            || self.parameter_adjust_flag
            || self.toggle_primary_leg_state
            || self.toggle_secondary_leg_state;
        if action_pending && self.walker.walk_state() == WalkState::Stopped {
            return;
        }

        self.walker.update_walk(
            &mut self.model,
            self.linear_velocity_input,
            self.angular_velocity_input,
        );
        self.walker.update_manual(
            &mut self.model,
            self.primary_leg_selection,
            self.primary_tip_velocity_input,
            self.secondary_leg_selection,
            self.secondary_tip_velocity_input,
        );
        self.poser.update_stance(&mut self.model);

        for leg in self.model.legs_mut() {
            let mut target = leg.poser.current_tip_position;
            if leg.leg_state() != LegState::Manual {
                target.z -= leg.delta_z();
            }
            leg.set_desired_tip_position(target);
            leg.apply_ik(true);
        }

        let report = self.walker.report();
        if report.linear_velocity_clamped || report.angular_velocity_clamped {
            self.warn_throttled(format_args!(
                "Commanded velocity clamped by acceleration limits."
            ));
        }
        if report.stride_clamped {
            self.warn_throttled(format_args!("Stride clamped by workspace radius."));
        }
    }

    /// Load the pending gait selection once the walker has stopped.
    fn change_gait(&mut self) {
        if self.walker.walk_state() == WalkState::Stopped {
            self.params.select_gait(self.gait_selection);
            if let Err(e) = self.walker.init(&self.params, &mut self.model) {
                warn!("Could not load gait parameters: {}", e);
                self.gait_change_flag = false;
                return;
            }
            // Let the stance snap to the new phase tables without a limited
            // transient; the clamps return when the walker next stops.
            self.walker.set_acceleration_limits_unlimited();
            info!("Now using {} mode.", self.params.walk.gait_type);
            self.gait_change_flag = false;
        } else {
            self.info_throttled(format_args!("Stopping hexapod to change gait..."));
            self.force_stop_inputs();
        }
    }

    /// Apply the pending parameter adjustment once the walker has stopped.
    fn adjust_parameter(&mut self) {
        if self.walker.walk_state() != WalkState::Stopped {
            self.info_throttled(format_args!("Stopping hexapod to adjust parameters..."));
            self.force_stop_inputs();
            return;
        }

        if !self.new_parameter_set {
            let selection = self.parameter_selection;
            let (name, value, default, min, max, hit_bound) =
                match self.params.select(selection) {
                    Some(p) => {
                        let hit_bound = p.adjust();
                        (p.name.clone(), p.value, p.default, p.min, p.max, hit_bound)
                    }
                    None => {
                        self.parameter_adjust_flag = false;
                        return;
                    }
                };

            if hit_bound {
                warn!("Parameter '{}' clamped to its bound at {}.", name, value);
            }

            self.impedance.init(&self.params, &mut self.model);
            if affects_stance(selection) {
                if let Err(e) = self.walker.init(&self.params, &mut self.model) {
                    warn!("Could not re-initialise the walker: {}", e);
                }
            }
            self.new_parameter_set = true;
            info!(
                "Attempting to adjust '{}' parameter to {}. (Default: {}, Min: {}, Max: {})...",
                name, value, default, min, max
            );
        } else {
            let progress = self.poser.step_to_new_stance(&mut self.model, &self.walker);
            if progress >= 1.0 {
                if let Some(p) = self.params.selected(self.parameter_selection) {
                    info!(
                        "Parameter '{}' set to {}. (Default: {}, Min: {}, Max: {})",
                        p.name, p.value, p.default, p.min, p.max
                    );
                }
                self.parameter_adjust_flag = false;
                self.new_parameter_set = false;
            }
        }
    }

    /// Progress the pending leg-state toggle once the walker has stopped.
    fn leg_state_toggle(&mut self) {
        if self.walker.walk_state() != WalkState::Stopped {
            self.info_throttled(format_args!("Stopping hexapod to transition leg state..."));
            self.force_stop_inputs();
            return;
        }

        let leg_id = if self.toggle_primary_leg_state {
            self.primary_leg_selection
        } else {
            self.secondary_leg_selection
        };
        let leg_id = match leg_id {
            Some(id) => id,
            None => {
                self.toggle_primary_leg_state = false;
                self.toggle_secondary_leg_state = false;
                return;
            }
        };

        let leg_state = match self.model.leg_by_id(leg_id) {
            Some(leg) => leg.leg_state(),
            None => {
                self.toggle_primary_leg_state = false;
                self.toggle_secondary_leg_state = false;
                return;
            }
        };
        let leg_name = self.model.leg_by_id(leg_id).unwrap().id_name().to_string();

        match leg_state {
            LegState::Walking => {
                if self.manual_leg_count < MAX_MANUAL_LEGS {
                    info!("{} leg transitioning to MANUAL state...", leg_name);
                    self.model
                        .leg_by_id_mut(leg_id)
                        .unwrap()
                        .set_leg_state(LegState::WalkingToManual);
                } else {
                    warn!(
                        "Only allowed to have {} legs manually manipulated at one time.",
                        MAX_MANUAL_LEGS
                    );
                    self.toggle_primary_leg_state = false;
                    self.toggle_secondary_leg_state = false;
                }
            }
            LegState::Manual => {
                info!("{} leg transitioning to WALKING state...", leg_name);
                self.model
                    .leg_by_id_mut(leg_id)
                    .unwrap()
                    .set_leg_state(LegState::ManualToWalking);
            }
            LegState::WalkingToManual | LegState::ManualToWalking => {
                // Force the pose to the new default while the support
                // polygon changes
                self.poser
                    .set_pose_reset_mode(PoseResetMode::ImmediateAllReset);
                let progress =
                    self.poser
                        .pose_for_leg_manipulation(&mut self.model, &self.walker, leg_id);

                if self.params.impedance.dynamic_stiffness {
                    let ratio = if leg_state == LegState::WalkingToManual {
                        progress
                    } else {
                        1.0 - progress
                    };
                    self.impedance
                        .update_stiffness_transition(&mut self.model, leg_id, ratio);
                }

                if progress >= 1.0 {
                    let leg = self.model.leg_by_id_mut(leg_id).unwrap();
                    match leg_state {
                        LegState::WalkingToManual => {
                            leg.set_leg_state(LegState::Manual);
                            self.manual_leg_count += 1;
                            info!("{} leg set to state: MANUAL.", leg_name);
                        }
                        LegState::ManualToWalking => {
                            leg.set_leg_state(LegState::Walking);
                            self.manual_leg_count -= 1;
                            info!("{} leg set to state: WALKING.", leg_name);
                        }
                        _ => unreachable!(),
                    }
                    self.toggle_primary_leg_state = false;
                    self.toggle_secondary_leg_state = false;
                    self.poser.set_pose_reset_mode(PoseResetMode::NoReset);
                }
            }
        }
    }

    /// Derive and bound the joint velocity demands from consecutive
    /// position demands.
    fn update_desired_joint_state(&mut self) {
        let time_delta = self.params.control.time_delta;
        let mut clamped_joint: Option<String> = None;

        for leg in self.model.legs_mut() {
            for joint in leg.joints_mut() {
                if joint.update_desired_velocity(time_delta, true) {
                    clamped_joint = Some(joint.name.clone());
                }
            }
        }

        if let Some(name) = clamped_joint {
            self.warn_throttled(format_args!(
                "Joint {} velocity demand clamped to its maximum.",
                name
            ));
        }
    }

    // ---- OUTPUT ASSEMBLY ----

    /// Build the servo demands for the actuator adapter. Demands are shifted
    /// back into the actuator frame by each joint's position offset.
    pub fn servo_demands(&self) -> ServoDems {
        let mut dems = ServoDems::default();
        for leg in self.model.legs() {
            for joint in leg.joints() {
                dems.name.push(joint.name.clone());
                dems.pos_rad.push(joint.desired_position + joint.position_offset);
                dems.speed_rads.push(joint.desired_velocity.abs());
            }
        }
        dems
    }

    /// Build the per-leg archive rows for this tick.
    pub fn leg_state_records(&self, time_s: f64) -> Vec<LegStateRecord> {
        self.model
            .legs()
            .iter()
            .map(|leg| LegStateRecord {
                time_s,
                leg_name: leg.id_name().to_string(),
                walker_tip_x: leg.stepper.current_tip_position.x,
                walker_tip_y: leg.stepper.current_tip_position.y,
                walker_tip_z: leg.stepper.current_tip_position.z,
                poser_tip_x: leg.poser.current_tip_position.x,
                poser_tip_y: leg.poser.current_tip_position.y,
                poser_tip_z: leg.poser.current_tip_position.z,
                swing_progress: leg.stepper.swing_progress,
                stance_progress: leg.stepper.stance_progress,
                tip_force: leg.tip_force(),
                delta_z: leg.delta_z(),
                virtual_stiffness: leg.virtual_stiffness(),
            })
            .collect()
    }

    // ---- PRIVATE HELPERS ----

    fn force_stop_inputs(&mut self) {
        self.linear_velocity_input = Vector2::zeros();
        self.angular_velocity_input = 0.0;
    }

    fn throttle_open(&self) -> bool {
        self.tick_count % self.throttle_ticks == 1 || self.throttle_ticks == 1
    }

    fn info_throttled(&self, args: std::fmt::Arguments) {
        if self.throttle_open() {
            info!("{}", args);
        }
    }

    fn warn_throttled(&self, args: std::fmt::Arguments) {
        if self.throttle_open() {
            warn!("{}", args);
        }
    }

    /// Warn once when a transition overruns twice its nominal duration.
    fn check_transition_budget(&mut self, nominal_duration: f64) {
        if self.transition_budget_warned {
            return;
        }
        let elapsed = self.transition_tick_count as f64 * self.params.control.time_delta;
        if elapsed > 2.0 * nominal_duration {
            warn!(
                "State transition exceeded twice its nominal duration of {:.1} s.",
                nominal_duration
            );
            self.transition_budget_warned = true;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test;
