//! # Telecommand processor module
//!
//! The telecommand processor routes commands coming from any source (remote
//! teleoperation or a timed script) into the state controller's intake
//! surface.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector3;

// Internal
use crate::state_ctrl::StateController;
use comms_if::tc::Tc;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand against the state controller.
pub fn exec(sc: &mut StateController, tc: &Tc) {
    match *tc {
        Tc::None => (),
        Tc::Heartbeat => {
            debug!("Received Heartbeat command");
        }
        Tc::BodyVelocity {
            linear_x,
            linear_y,
            angular_z,
        } => sc.body_velocity_input(linear_x, linear_y, angular_z),
        Tc::PrimaryTipVelocity { x, y, z } => sc.primary_tip_velocity_input(x, y, z),
        Tc::SecondaryTipVelocity { x, y, z } => sc.secondary_tip_velocity_input(x, y, z),
        Tc::BodyPose {
            x,
            y,
            z,
            roll,
            pitch,
            yaw,
        } => sc.body_pose_input(Vector3::new(x, y, z), Vector3::new(roll, pitch, yaw)),
        Tc::SystemState { state } => sc.system_state_input(state),
        Tc::GaitSelection { gait } => sc.gait_selection_input(gait),
        Tc::PosingMode { mode } => sc.posing_mode_input(mode),
        Tc::CruiseControl { mode } => sc.cruise_control_input(mode),
        Tc::AutoNavigation { mode } => sc.auto_navigation_input(mode),
        Tc::ParameterSelection { selection } => sc.parameter_selection_input(selection),
        Tc::ParameterAdjust { direction } => sc.parameter_adjust_input(direction),
        Tc::PrimaryLegSelection { leg } => sc.primary_leg_selection_input(leg),
        Tc::SecondaryLegSelection { leg } => sc.secondary_leg_selection_input(leg),
        Tc::PrimaryLegStateToggle => sc.primary_leg_state_toggle_input(),
        Tc::SecondaryLegStateToggle => sc.secondary_leg_state_toggle_input(),
        Tc::PoseResetMode { mode } => sc.pose_reset_input(mode),
    }
}
