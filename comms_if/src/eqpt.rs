//! # Equipment message surface
//!
//! Messages exchanged with the hexapod's platform equipment: the servo
//! controller (demands out) and the sensor suite (IMU, joint states and tip
//! forces in).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod sensors;
pub mod servo;

// ---------------------------------------------------------------------------
// REEXPORTS
// ---------------------------------------------------------------------------

pub use sensors::*;
pub use servo::*;
