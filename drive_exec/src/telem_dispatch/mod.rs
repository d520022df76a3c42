//! # Telemetry dispatch module
//!
//! The dispatcher owns all controller state and is the only place it is mutated. Every simulator
//! event and every operator event passes through it on the control thread, one at a time.
//!
//! For each telemetry event exactly one control command is sent back to the simulator:
//!
//! 1. The mode selects the steering source: zero when stopped, the model's prediction in
//!    autonomous, the operator's setpoint (then centering decay) in manual and training.
//! 2. In training the image and the operator's steering are recorded as a sample.
//! 3. The speed regulator computes the throttle.
//! 4. The command is sent, then a status report is published without blocking.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;
mod status;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::sim::{ControlCmd, SimMsgParseError, Telemetry};

// Internal
pub use state::*;
pub use status::*;

use crate::batch_acc::{BatchError, TrainReport};
use crate::mode_mgr::Mode;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Bidirectional link to the simulator.
pub trait SimLink {
    /// Return the next event from the simulator, or `None` if nothing arrived in time.
    fn next_event(&mut self) -> Result<Option<LinkEvent>, LinkError>;

    /// Send a control command to the connected simulator.
    fn send_control(&mut self, cmd: ControlCmd) -> Result<(), LinkError>;
}

/// Destination for status reports.
///
/// Publishing must never block the control thread.
pub trait StatusSink {
    fn publish(&mut self, report: StatusReport);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of handling one telemetry event.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutput {
    /// Command sent to the simulator.
    pub cmd: ControlCmd,

    /// Mode the command was computed in.
    pub mode: Mode,

    /// Speed reported by the simulator.
    pub measured_speed: f64,

    /// Speed setpoint given to the regulator.
    pub target_speed: f64,

    pub throttle_saturated: bool,

    /// True if the autopilot could not produce a prediction and the safe command was sent.
    pub inference_failed: bool,

    /// Set if this tick completed a training batch.
    pub train_report: Option<TrainReport>,

    /// Set to the number of samples lost if training failed and the batch was dropped.
    pub dropped_samples: Option<usize>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An event received from the simulator link.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Telemetry(Telemetry),
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Malformed message from the simulator: {0}")]
    Malformed(SimMsgParseError),

    #[error("The simulator sent a message which was not valid UTF-8")]
    NonUtf8,

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Training failed: {0}")]
    Training(BatchError),

    #[error("Simulator link failed: {0}")]
    Link(LinkError),
}
