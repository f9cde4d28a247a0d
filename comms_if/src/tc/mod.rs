//! # Telecommand module
//!
//! This module provides the teleoperation command surface of the hexapod.
//! Every command the operator can send, whether from the remote or from a
//! timed script, is a variant of [`Tc`]. Commands are exchanged as JSON with
//! a `"type"` tag.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Leg selection value meaning "no leg selected".
pub const LEG_UNDESIGNATED: i8 = -1;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the hexapod by the operator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Tc {
    /// No action required.
    #[serde(alias = "NONE")]
    None,

    /// Connection liveness check.
    #[serde(alias = "HEARTBEAT")]
    Heartbeat,

    /// Desired body velocity: planar linear components and yaw rate.
    #[serde(alias = "BODY_VELOCITY")]
    BodyVelocity {
        linear_x: f64,
        linear_y: f64,
        angular_z: f64,
    },

    /// Desired tip velocity for the leg selected in the primary slot.
    #[serde(alias = "PRIMARY_TIP_VELOCITY")]
    PrimaryTipVelocity { x: f64, y: f64, z: f64 },

    /// Desired tip velocity for the leg selected in the secondary slot.
    #[serde(alias = "SECONDARY_TIP_VELOCITY")]
    SecondaryTipVelocity { x: f64, y: f64, z: f64 },

    /// Manual body pose intent: translation and roll/pitch/yaw.
    #[serde(alias = "BODY_POSE")]
    BodyPose {
        x: f64,
        y: f64,
        z: f64,
        roll: f64,
        pitch: f64,
        yaw: f64,
    },

    /// Request a new top-level system state.
    #[serde(alias = "SYSTEM_STATE")]
    SystemState { state: SystemState },

    /// Select the gait used by the walk controller.
    #[serde(alias = "GAIT_SELECTION")]
    GaitSelection { gait: GaitDesignation },

    /// Select which manual posing inputs the body responds to.
    #[serde(alias = "POSING_MODE")]
    PosingMode { mode: PosingMode },

    /// Toggle constant-velocity cruise control.
    #[serde(alias = "CRUISE_CONTROL")]
    CruiseControl { mode: CruiseControlMode },

    /// Toggle autonomous velocity input.
    #[serde(alias = "AUTO_NAVIGATION")]
    AutoNavigation { mode: AutoNavigationMode },

    /// Select which runtime-adjustable parameter subsequent adjustment
    /// commands apply to.
    #[serde(alias = "PARAMETER_SELECTION")]
    ParameterSelection { selection: ParameterSelection },

    /// Adjust the selected parameter: -1 decrement, 0 idle, +1 increment.
    #[serde(alias = "PARAMETER_ADJUST")]
    ParameterAdjust { direction: i8 },

    /// Select a leg for the primary manual control slot
    /// ([`LEG_UNDESIGNATED`] deselects).
    #[serde(alias = "PRIMARY_LEG_SELECTION")]
    PrimaryLegSelection { leg: i8 },

    /// Select a leg for the secondary manual control slot.
    #[serde(alias = "SECONDARY_LEG_SELECTION")]
    SecondaryLegSelection { leg: i8 },

    /// Toggle the primary-slot leg between WALKING and MANUAL.
    #[serde(alias = "PRIMARY_LEG_STATE")]
    PrimaryLegStateToggle,

    /// Toggle the secondary-slot leg between WALKING and MANUAL.
    #[serde(alias = "SECONDARY_LEG_STATE")]
    SecondaryLegStateToggle,

    /// Request a body pose reset.
    #[serde(alias = "POSE_RESET_MODE")]
    PoseResetMode { mode: PoseResetMode },
}

/// Top-level system states of the hexapod.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SystemState {
    #[serde(alias = "WAITING_FOR_USER")]
    WaitingForUser,

    #[serde(alias = "UNKNOWN")]
    Unknown,

    #[serde(alias = "OFF")]
    Off,

    #[serde(alias = "PACKED")]
    Packed,

    #[serde(alias = "READY")]
    Ready,

    #[serde(alias = "RUNNING")]
    Running,

    #[serde(alias = "SUSPENDED")]
    Suspended,
}

/// Selectable gaits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GaitDesignation {
    #[serde(alias = "TRIPOD")]
    Tripod,

    #[serde(alias = "RIPPLE")]
    Ripple,

    #[serde(alias = "WAVE")]
    Wave,

    #[serde(alias = "AMBLE")]
    Amble,

    #[serde(alias = "UNDESIGNATED")]
    Undesignated,
}

/// Manual posing input gating modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PosingMode {
    #[serde(alias = "NO_POSING")]
    NoPosing,

    #[serde(alias = "X_Y")]
    XY,

    #[serde(alias = "PITCH_ROLL")]
    PitchRoll,

    #[serde(alias = "Z_YAW")]
    ZYaw,
}

/// Cruise control modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CruiseControlMode {
    #[serde(alias = "OFF")]
    Off,

    #[serde(alias = "ON")]
    On,
}

/// Auto navigation modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AutoNavigationMode {
    #[serde(alias = "OFF")]
    Off,

    #[serde(alias = "ON")]
    On,
}

/// The runtime-adjustable parameter subset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ParameterSelection {
    #[serde(alias = "NO_SELECTION")]
    NoSelection,

    #[serde(alias = "STEP_FREQUENCY")]
    StepFrequency,

    #[serde(alias = "STEP_CLEARANCE")]
    StepClearance,

    #[serde(alias = "BODY_CLEARANCE")]
    BodyClearance,

    #[serde(alias = "LEG_SPAN_SCALE")]
    LegSpanScale,

    #[serde(alias = "VIRTUAL_MASS")]
    VirtualMass,

    #[serde(alias = "VIRTUAL_STIFFNESS")]
    VirtualStiffness,

    #[serde(alias = "VIRTUAL_DAMPING")]
    VirtualDamping,

    #[serde(alias = "FORCE_GAIN")]
    ForceGain,
}

/// Body pose reset modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PoseResetMode {
    #[serde(alias = "NO_RESET")]
    NoReset,

    #[serde(alias = "Z_AND_YAW_RESET")]
    ZAndYawReset,

    #[serde(alias = "X_AND_Y_RESET")]
    XAndYReset,

    #[serde(alias = "PITCH_AND_ROLL_RESET")]
    PitchAndRollReset,

    #[serde(alias = "ALL_RESET")]
    AllReset,

    #[serde(alias = "IMMEDIATE_ALL_RESET")]
    ImmediateAllReset,
}

/// Response to a telecommand sent back to the operator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TcResponse {
    /// The command was accepted for processing.
    Ok,

    /// The command could not be executed in the current state.
    CannotExecute,

    /// The command could not be parsed.
    Invalid,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tc_from_json() {
        let tc = Tc::from_json(
            r#"{"type": "BODY_VELOCITY", "linear_x": 0.1, "linear_y": 0.0, "angular_z": 0.0}"#,
        )
        .unwrap();

        assert_eq!(
            tc,
            Tc::BodyVelocity {
                linear_x: 0.1,
                linear_y: 0.0,
                angular_z: 0.0
            }
        );

        let tc = Tc::from_json(r#"{"type": "SYSTEM_STATE", "state": "RUNNING"}"#).unwrap();
        assert_eq!(
            tc,
            Tc::SystemState {
                state: SystemState::Running
            }
        );
    }

    #[test]
    fn test_tc_rejects_bad_json() {
        assert!(Tc::from_json(r#"{"type": "NOT_A_COMMAND"}"#).is_err());
        assert!(Tc::from_json("not json at all").is_err());
    }

    #[test]
    fn test_tc_round_trip() {
        let tc = Tc::GaitSelection {
            gait: GaitDesignation::Wave,
        };
        let json = tc.to_json().unwrap();
        assert_eq!(Tc::from_json(&json).unwrap(), tc);
    }
}
