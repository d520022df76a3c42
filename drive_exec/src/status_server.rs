//! # Status Server
//!
//! Publishes status reports to any listening operator display. The server runs in its own thread
//! and is fed through a bounded channel, so a slow or absent display never holds up the control
//! loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions};
use log::{debug, info, warn};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use crate::telem_dispatch::StatusReport;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Status server
pub struct StatusServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StatusServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the status: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the status: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StatusServer {
    /// Create a new instance of the status server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, StatusServerError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, endpoint)
            .map_err(StatusServerError::SocketError)?;

        Ok(Self { socket })
    }

    pub fn send(&mut self, report: &StatusReport) -> Result<(), StatusServerError> {
        let report_string =
            serde_json::to_string(report).map_err(StatusServerError::SerializationError)?;

        self.socket
            .send(report_string.as_str(), 0)
            .map_err(StatusServerError::SendError)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Start the status thread.
///
/// The thread publishes every report it receives and exits when all senders are dropped. If the
/// socket cannot be created the reports are still drained and logged.
pub fn spawn(ctx: zmq::Context, endpoint: String, reports: Receiver<StatusReport>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut server = match StatusServer::new(&ctx, &endpoint) {
            Ok(s) => {
                info!("StatusServer publishing on {}", endpoint);
                Some(s)
            }
            Err(e) => {
                warn!("StatusServer unavailable, status will only be logged: {}", e);
                None
            }
        };

        let mut last_text = String::new();

        for report in reports.iter() {
            // Log only on change, reports arrive at the telemetry rate
            let text = report.to_string();
            if text != last_text {
                debug!("Status:\n{}", text);
                last_text = text;
            }

            if let Some(ref mut s) = server {
                if let Err(e) = s.send(&report) {
                    debug!("Status not published: {}", e);
                }
            }
        }

        info!("StatusServer stopped");
    })
}
