//! # Servo Equipment Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent from the ServoClient to the servo platform server.
///
/// Parallel arrays, one entry per joint, keyed by the joint's name. The servo
/// server maps names to bus IDs.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ServoDems {
    /// Joint names, one per demanded actuator.
    pub name: Vec<String>,

    /// The demanded position of each actuator in radians.
    pub pos_rad: Vec<f64>,

    /// The demanded speed of each actuator in radians/second.
    pub speed_rads: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Response from the servo server based on the demands sent by the client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoDemsResponse {
    /// Demands were valid and will be executed
    DemsOk,

    /// Demands were invalid and have been rejected
    DemsInvalid,

    /// Equipment is invalid so demands cannot be actuated
    EqptInvalid,
}
