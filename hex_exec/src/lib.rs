//! # Hexapod executable library
//!
//! The control pipeline of the hexapod: kinematic model, walk, pose and
//! impedance controllers, the top-level state controller and the boundary
//! adapters connecting them to the platform equipment and the operator.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod impedance_ctrl;
pub mod model;
pub mod params;
pub mod pose_ctrl;
pub mod sens_client;
pub mod servo_client;
pub mod state_ctrl;
pub mod tc_processor;
pub mod tc_server;
pub mod tm_server;
pub mod walk_ctrl;
