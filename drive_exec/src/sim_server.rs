//! # Simulator Server
//!
//! ZMQ link to the simulator bridge. The server binds a PAIR socket, the bridge connects to it and
//! relays telemetry in, and steering commands out.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    sim::{ControlCmd, SimInbound},
};
use log::{info, trace};

use crate::telem_dispatch::{LinkError, LinkEvent, SimLink};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulator server
pub struct SimServer {
    socket: MonitoredSocket,

    /// Connection state last seen from the socket monitor
    peer_connected: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServer {
    /// Create a new instance of the simulator server bound to `endpoint`.
    ///
    /// This function will not block until the bridge connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, SimServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PAIR, socket_options, endpoint)
            .map_err(SimServerError::SocketError)?;

        info!("SimServer bound to {}", endpoint);

        Ok(Self {
            socket,
            peer_connected: false,
        })
    }
}

impl SimLink for SimServer {
    fn next_event(&mut self) -> Result<Option<LinkEvent>, LinkError> {
        // Dropped bridges are only visible through the monitor
        let connected = self.socket.connected();
        if connected != self.peer_connected {
            self.peer_connected = connected;
            if !connected {
                return Ok(Some(LinkEvent::Disconnected));
            }
            info!("Simulator bridge connected");
        }

        let msg = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(LinkError::NonUtf8),
            // No message in timeout
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(LinkError::Transport(e.to_string())),
        };

        match SimInbound::from_json(&msg).map_err(LinkError::Malformed)? {
            SimInbound::Telemetry(frame) => frame
                .decode()
                .map(|t| Some(LinkEvent::Telemetry(t)))
                .map_err(LinkError::Malformed),
            SimInbound::Connect { sid } => {
                info!("Simulator session started (sid: {:?})", sid);
                Ok(Some(LinkEvent::Connected))
            }
            SimInbound::Disconnect => Ok(Some(LinkEvent::Disconnected)),
        }
    }

    fn send_control(&mut self, cmd: ControlCmd) -> Result<(), LinkError> {
        if !self.socket.connected() {
            trace!("No bridge connected, command not sent");
            return Ok(());
        }

        let msg = cmd
            .to_outbound()
            .to_json()
            .map_err(|e| LinkError::Transport(e.to_string()))?;

        self.socket
            .send(msg.as_str(), 0)
            .map_err(|e| LinkError::Transport(e.to_string()))
    }
}
