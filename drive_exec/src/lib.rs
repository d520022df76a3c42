//! # Drive library.
//!
//! This library allows other crates in the workspace, and the integration tests, to access items
//! defined inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Batch accumulator - collects labelled samples and runs training steps
pub mod batch_acc;

/// Kinematic control - operator steering and speed setpoints
pub mod kin_ctrl;

/// Mode manager - the operating mode state machine
pub mod mode_mgr;

/// Steering model interfaces and the linear model
pub mod model;

/// Executable parameters
pub mod params;

/// Image preprocessing for the steering model
pub mod preprocess;

/// Simulator server - the ZMQ link to the simulator bridge
pub mod sim_server;

/// Speed regulation - proportional throttle control
pub mod speed_reg;

/// Status server - publishes status reports to the operator display
pub mod status_server;

/// Telemetry dispatcher - runs the control pipeline for every simulator event
pub mod telem_dispatch;

/// UI event sources - the console and scripts
pub mod ui_source;
