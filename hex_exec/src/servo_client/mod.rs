//! # Servo Client
//!
//! This module provides the actuator boundary: a REQ/REP connection to the
//! servo platform server over which joint demands are published once per
//! tick.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::{ServoDems, ServoDemsResponse},
    net::{self, zmq, NetError, NetParams, SocketOptions},
};

use crate::model::Model;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ServoClient {
    dems_socket: zmq::Socket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ServoClientError {
    #[error("Socket error: {0}")]
    SocketError(NetError),

    #[error("Could not send demands to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a response from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the demands: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ServoClient {
    /// Create a new instance of the servo client and configure the bus with
    /// an initial demand set at the setup speed.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        model: &Model,
        setup_speed: f64,
    ) -> Result<Self, ServoClientError> {
        let dems_socket_options = SocketOptions {
            recv_timeout: 10,
            send_timeout: 10,
            linger: 1,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let dems_socket = net::create_socket(
            ctx,
            zmq::REQ,
            dems_socket_options,
            &params.servo_dems_endpoint,
        )
        .map_err(ServoClientError::SocketError)?;

        let client = Self { dems_socket };

        // Drive every joint to its current position at the setup speed so
        // the bus comes up without a jump
        let mut setup_dems = ServoDems::default();
        for leg in model.legs() {
            for joint in leg.joints() {
                setup_dems.name.push(joint.name.clone());
                setup_dems
                    .pos_rad
                    .push(joint.current_position + joint.position_offset);
                setup_dems.speed_rads.push(setup_speed);
            }
        }
        // The server may not be up yet; setup demands are best-effort
        let _ = client.send_demands(&setup_dems);

        Ok(client)
    }

    /// Send demands to the server.
    ///
    /// Sends the given servo demands to the server. If the server
    /// acknowledges the demands within the configured timeout the response
    /// is returned, otherwise an `Err()`.
    pub fn send_demands(&self, demands: &ServoDems) -> Result<ServoDemsResponse, ServoClientError> {
        let dems_str =
            serde_json::to_string(demands).map_err(ServoClientError::SerializationError)?;

        self.dems_socket
            .send(&dems_str, 0)
            .map_err(ServoClientError::SendError)?;

        let msg = self
            .dems_socket
            .recv_msg(0)
            .map_err(ServoClientError::RecvError)?;

        serde_json::from_str(msg.as_str().unwrap_or(""))
            .map_err(ServoClientError::DeserializeError)
    }
}
