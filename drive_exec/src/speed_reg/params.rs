//! Parameters structure for SpeedReg

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for speed regulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Proportional gain from speed error to throttle.
    pub k_p: f64,

    /// Lowest throttle demand, normalised
    pub throttle_min: f64,

    /// Highest throttle demand, normalised
    pub throttle_max: f64,

    // ---- AUTOPILOT SETPOINTS ----

    /// Autopilot speed setpoint while driving straight.
    ///
    /// Units: mph
    pub target_speed: f64,

    /// Autopilot speed setpoint while the predicted steering is above `steering_threshold`.
    ///
    /// Units: mph
    pub turn_target_speed: f64,

    /// Predicted steering magnitude above which the autopilot slows down.
    ///
    /// Units: fraction of the maximum steering angle
    pub steering_threshold: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            k_p: 0.35,
            throttle_min: -1.0,
            throttle_max: 1.0,
            target_speed: 20.0,
            turn_target_speed: 15.0,
            steering_threshold: 4.0 / 25.0,
        }
    }
}
