//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, the networking
//! library chosen for the software. The exec talks to its collaborators over
//! four sockets: a REP socket for telecommands, a REQ socket for servo
//! demands, a SUB socket for sensor frames and a PUB socket for telemetry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use zmq::{Context, Socket, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| NetError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoint parameters, loaded from `net.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Endpoint the exec's telecommand server binds to.
    pub tc_endpoint: String,

    /// Endpoint of the servo platform server's demand socket.
    pub servo_dems_endpoint: String,

    /// Endpoint of the platform server's sensor frame publisher.
    pub sensor_frame_endpoint: String,

    /// Endpoint the exec's telemetry publisher binds to.
    pub telemetry_endpoint: String,
}

/// Represents options which can be set on a socket created with
/// [`create_socket`].
///
/// Most options here correspond to those found in the
/// [`zmq_setsockopt`](http://api.zeromq.org/master:zmq-setsockopt)
/// documentation.
pub struct SocketOptions {
    /// Indicates if the socket should bind itself to the endpoint. Servers
    /// should have this value set as `true`, clients should have it set as
    /// `false`.
    ///
    /// The default value is `false`.
    pub bind: bool,

    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_RCVTIMEO`: Maximum time before a recv operation returns with `EAGAIN`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with `EAGAIN`
    pub send_timeout: i32,

    /// `ZMQ_REQ_CORRELATE`: Match replies with requests
    pub req_correlate: bool,

    /// `ZMQ_REQ_RELAXED`: Relax strict alternation between request and reply
    pub req_relaxed: bool,

    /// Subscription topic for SUB sockets. An empty string subscribes to
    /// everything. Ignored for other socket types.
    pub subscribe: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum NetError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error setting socket option {0}: {1}")]
    SocketOptionError(String, zmq::Error),

    #[error("Could not bind the socket to {0}: {1}")]
    BindError(String, zmq::Error),

    #[error("Could not connect the socket to {0}: {1}")]
    ConnectError(String, zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a socket of the given type, apply the options and bind or connect
/// it to the endpoint.
pub fn create_socket(
    ctx: &Context,
    socket_type: SocketType,
    options: SocketOptions,
    endpoint: &str,
) -> Result<Socket, NetError> {
    let socket = ctx
        .socket(socket_type)
        .map_err(NetError::CreateSocketError)?;

    set_sockopts!(
        socket,
        (set_linger, options.linger),
        (set_rcvtimeo, options.recv_timeout),
        (set_sndtimeo, options.send_timeout)
    );

    // REQ-only options are invalid on other socket types
    if socket_type == zmq::REQ {
        set_sockopts!(
            socket,
            (set_req_correlate, options.req_correlate),
            (set_req_relaxed, options.req_relaxed)
        );
    }

    if socket_type == zmq::SUB {
        if let Some(ref topic) = options.subscribe {
            socket
                .set_subscribe(topic.as_bytes())
                .map_err(|e| NetError::SocketOptionError("set_subscribe".into(), e))?;
        }
    }

    if options.bind {
        socket
            .bind(endpoint)
            .map_err(|e| NetError::BindError(endpoint.into(), e))?;
    } else {
        socket
            .connect(endpoint)
            .map_err(|e| NetError::ConnectError(endpoint.into(), e))?;
    }

    Ok(socket)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            bind: false,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            req_correlate: false,
            req_relaxed: false,
            subscribe: None,
        }
    }
}
