//! # Sensor input surface
//!
//! Data produced by the platform sensor suite and consumed by the exec. A
//! [`SensorFrame`] carries whichever readings were available when the frame
//! was published; absent readings are `None` and the exec proceeds with what
//! is present.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Inertial measurement unit reading.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ImuData {
    /// Orientation quaternion as `[w, x, y, z]`.
    pub orientation: [f64; 4],

    /// Linear acceleration in meters/second^2.
    pub linear_acceleration: [f64; 3],

    /// Angular velocity in radians/second.
    pub angular_velocity: [f64; 3],
}

/// Joint state reading: parallel arrays, one entry per joint.
///
/// `velocity` and `effort` may be empty when the sensor bus does not report
/// them.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct JointStateData {
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

/// Raw tip force readings from the foot pressure sensors.
///
/// The platform publishes two raw values per leg; entry `2 * leg_id` carries
/// the vertical channel used by the impedance controller.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TipForceData {
    pub effort: Vec<f64>,
}

/// A single frame of sensor data published by the platform server.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SensorFrame {
    pub imu: Option<ImuData>,
    pub joint_states: Option<JointStateData>,
    pub tip_forces: Option<TipForceData>,
}
