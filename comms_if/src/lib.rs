//! # Communications Interface
//!
//! This crate defines the message vocabulary shared between the hexapod
//! executable and its external collaborators (the teleoperation surface, the
//! servo platform server and ground telemetry consumers), along with the
//! networking abstractions used to exchange those messages.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod eqpt;
pub mod net;
pub mod tc;
