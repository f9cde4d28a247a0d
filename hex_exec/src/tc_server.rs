//! # Telecommand Server
//!
//! REP endpoint on which the remote teleoperation surface delivers
//! telecommands. Every received command is acknowledged with a
//! [`TcResponse`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    net::{self, zmq, NetError, NetParams, SocketOptions},
    tc::{Tc, TcParseError, TcResponse},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct TcServer {
    tc_socket: zmq::Socket,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum TcServerError {
    #[error("Socket error: {0}")]
    SocketError(NetError),

    #[error("Could not receive a TC: {0}")]
    RecvError(zmq::Error),

    #[error("Could not parse the received TC: {0}")]
    TcParseError(TcParseError),

    #[error("Could not send the TC response: {0}")]
    SendError(zmq::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TcServer {
    /// Create a new instance of the telecommand server.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TcServerError> {
        let options = SocketOptions {
            bind: true,
            recv_timeout: 0,
            send_timeout: 10,
            ..Default::default()
        };

        let tc_socket = net::create_socket(ctx, zmq::REP, options, &params.tc_endpoint)
            .map_err(TcServerError::SocketError)?;

        Ok(Self { tc_socket })
    }

    /// Receive the next pending telecommand, or `None` if the queue is
    /// empty. A parse failure is answered with `TcResponse::Invalid` and
    /// reported as an error.
    pub fn receive_tc(&self) -> Result<Option<Tc>, TcServerError> {
        let msg = match self.tc_socket.recv_msg(0) {
            Ok(m) => m,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(TcServerError::RecvError(e)),
        };

        match Tc::from_json(msg.as_str().unwrap_or("")) {
            Ok(tc) => Ok(Some(tc)),
            Err(e) => {
                self.send_response(TcResponse::Invalid)?;
                Err(TcServerError::TcParseError(e))
            }
        }
    }

    /// Acknowledge the last received telecommand.
    pub fn send_response(&self, response: TcResponse) -> Result<(), TcServerError> {
        let response_str =
            serde_json::to_string(&response).expect("TcResponse serialization cannot fail");
        self.tc_socket
            .send(&response_str, 0)
            .map_err(TcServerError::SendError)
    }
}
