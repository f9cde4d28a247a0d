//! # Sensor Client
//!
//! Subscribes to the platform server's sensor frame stream (IMU, joint
//! states, tip forces). Frames are drained at the start of every tick;
//! the freshest data wins.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    eqpt::SensorFrame,
    net::{self, zmq, NetError, NetParams, SocketOptions},
};
use log::warn;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct SensClient {
    frame_socket: zmq::Socket,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum SensClientError {
    #[error("Socket error: {0}")]
    SocketError(NetError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SensClient {
    /// Create a new instance of the sensor client.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, SensClientError> {
        let options = SocketOptions {
            recv_timeout: 0,
            subscribe: Some(String::new()),
            ..Default::default()
        };

        let frame_socket =
            net::create_socket(ctx, zmq::SUB, options, &params.sensor_frame_endpoint)
                .map_err(SensClientError::SocketError)?;

        Ok(Self { frame_socket })
    }

    /// Drain all sensor frames which arrived since the last call, in
    /// arrival order.
    pub fn latest_frames(&self) -> Vec<SensorFrame> {
        let mut frames = Vec::new();

        loop {
            match self.frame_socket.recv_msg(0) {
                Ok(msg) => match serde_json::from_str(msg.as_str().unwrap_or("")) {
                    Ok(frame) => frames.push(frame),
                    Err(e) => warn!("Could not parse a sensor frame: {}", e),
                },
                // EAGAIN means the queue is empty
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => {
                    warn!("Sensor frame receive error: {}", e);
                    break;
                }
            }
        }

        frames
    }
}
