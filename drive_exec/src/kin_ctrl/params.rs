//! Parameters structure for KinCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for kinematic control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Highest speed setpoint the operator can request.
    ///
    /// Units: mph
    pub speed_limit: f64,

    /// Steering change produced by one turn command.
    ///
    /// Units: degrees
    pub turn_rate_deg: f64,

    /// Largest steering magnitude the operator can request.
    ///
    /// Units: fraction of the maximum steering angle
    pub steering_limit: f64,

    /// Steering decay applied on every manual tick.
    ///
    /// Units: fraction of the maximum steering angle per tick
    pub centering_torque: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            speed_limit: 30.0,
            turn_rate_deg: 0.5,
            steering_limit: 15.0 / 25.0,
            centering_torque: 0.01 / 25.0,
        }
    }
}
