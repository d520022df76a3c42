//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the live trainer software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Messages exchanged with the simulator bridge (telemetry in, steering commands out)
pub mod sim;

/// Discrete events emitted by the operator front-ends
pub mod ui;

/// Network module
pub mod net;
