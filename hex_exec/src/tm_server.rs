//! # Telemetry Server
//!
//! Publishes one [`TmFrame`] per tick on a PUB socket for ground consumers
//! (plotting, state displays, external gait synchronization).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::model::LegState;
use crate::state_ctrl::StateController;
use comms_if::net::{self, zmq, NetError, NetParams, SocketOptions};
use comms_if::tc::SystemState;
use crate::walk_ctrl::StepState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-leg telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct LegTm {
    pub name: String,
    pub leg_state: String,
    pub step_state: String,
    pub local_tip_position: [f64; 3],
    pub walker_tip_position: [f64; 3],
    pub poser_tip_position: [f64; 3],
    pub swing_progress: f64,
    pub stance_progress: f64,
    pub tip_force: f64,
    pub delta_z: f64,
    pub virtual_stiffness: f64,

    /// True when the leg is airborne or not under walk control; used by
    /// external consumers to synchronize with the step cycle.
    pub swing_or_nonwalking: bool,
}

/// One tick's telemetry frame.
#[derive(Debug, Clone, Serialize)]
pub struct TmFrame {
    pub time_s: f64,
    pub hexapod_type: String,
    pub system_state: SystemState,
    pub walk_state: String,
    pub gait: String,

    /// Body pose: translation then roll/pitch/yaw.
    pub pose_translation: [f64; 3],
    pub pose_rotation: [f64; 3],

    /// IMU echo: roll/pitch/yaw, linear acceleration, angular velocity.
    pub imu_orientation: [f64; 3],
    pub imu_linear_acceleration: [f64; 3],
    pub imu_angular_velocity: [f64; 3],

    /// Commanded body velocity.
    pub body_linear_velocity: [f64; 2],
    pub body_angular_velocity: f64,

    /// Orientation compensation errors: absement, position, velocity.
    pub rotation_pose_error: [[f64; 3]; 3],

    /// Translation compensation errors: absement, position, velocity.
    pub translation_pose_error: [[f64; 3]; 3],

    pub legs: Vec<LegTm>,
}

pub struct TmServer {
    tm_socket: zmq::Socket,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(NetError),

    #[error("Could not serialize the telemetry frame: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not publish the telemetry frame: {0}")]
    SendError(zmq::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TmFrame {
    /// Assemble the telemetry frame for the controller's current state.
    pub fn from_controller(sc: &StateController, time_s: f64) -> Self {
        let pose = sc.model().current_pose();
        let (roll, pitch, yaw) = pose.euler_angles();
        let imu = sc.poser().imu_data();
        let (imu_roll, imu_pitch, imu_yaw) = imu.orientation.euler_angles();

        let legs = sc
            .model()
            .legs()
            .iter()
            .map(|leg| {
                let stepper = &leg.stepper;
                let swing_or_nonwalking = stepper.step_state == StepState::Swing
                    || (leg.leg_state() != LegState::Walking
                        && leg.leg_state() != LegState::Manual);
                LegTm {
                    name: leg.id_name().to_string(),
                    leg_state: format!("{:?}", leg.leg_state()),
                    step_state: format!("{:?}", stepper.step_state),
                    local_tip_position: leg.local_tip_position().into(),
                    walker_tip_position: stepper.current_tip_position.into(),
                    poser_tip_position: leg.poser.current_tip_position.into(),
                    swing_progress: stepper.swing_progress,
                    stance_progress: stepper.stance_progress,
                    tip_force: leg.tip_force(),
                    delta_z: leg.delta_z(),
                    virtual_stiffness: leg.virtual_stiffness(),
                    swing_or_nonwalking,
                }
            })
            .collect();

        Self {
            time_s,
            hexapod_type: sc.params().model.hexapod_type.clone(),
            system_state: sc.system_state(),
            walk_state: format!("{:?}", sc.walker().walk_state()),
            gait: sc.walker().gait_name().to_string(),
            pose_translation: pose.position.into(),
            pose_rotation: [roll, pitch, yaw],
            imu_orientation: [imu_roll, imu_pitch, imu_yaw],
            imu_linear_acceleration: imu.linear_acceleration.into(),
            imu_angular_velocity: imu.angular_velocity.into(),
            body_linear_velocity: sc.walker().desired_linear_velocity().into(),
            body_angular_velocity: sc.walker().desired_angular_velocity(),
            rotation_pose_error: [
                sc.poser().rotation_absement_error().into(),
                sc.poser().rotation_position_error().into(),
                sc.poser().rotation_velocity_error().into(),
            ],
            translation_pose_error: [
                sc.poser().translation_absement_error().into(),
                sc.poser().translation_position_error().into(),
                sc.poser().translation_velocity_error().into(),
            ],
            legs,
        }
    }
}

impl TmServer {
    /// Create a new instance of the telemetry server.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TmServerError> {
        let options = SocketOptions {
            bind: true,
            send_timeout: 10,
            ..Default::default()
        };

        let tm_socket = net::create_socket(ctx, zmq::PUB, options, &params.telemetry_endpoint)
            .map_err(TmServerError::SocketError)?;

        Ok(Self { tm_socket })
    }

    /// Publish a telemetry frame, fire and forget.
    pub fn send(&self, frame: &TmFrame) -> Result<(), TmServerError> {
        let frame_str =
            serde_json::to_string(frame).map_err(TmServerError::SerializationError)?;
        self.tm_socket
            .send(&frame_str, 0)
            .map_err(TmServerError::SendError)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::test_params;

    #[test]
    fn test_frame_assembly() {
        let mut sc = StateController::new(test_params()).unwrap();
        sc.init_model(true);

        let frame = TmFrame::from_controller(&sc, 1.25);

        assert_eq!(frame.time_s, 1.25);
        assert_eq!(frame.legs.len(), 6);
        assert_eq!(frame.legs[0].name, "AR");
        // A parked walking leg is neither swinging nor non-walking
        assert!(!frame.legs[0].swing_or_nonwalking);
        // Frames serialize cleanly
        assert!(serde_json::to_string(&frame).is_ok());
    }
}
