//! Implementations for the SpeedReg state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::Params;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Proportional speed regulator.
///
/// There is no integral or derivative term, so a steady-state speed error is expected under load.
#[derive(Debug, Clone)]
pub struct SpeedReg {
    params: Params,
}

/// Output of one regulation step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeedRegOutput {
    /// Throttle demand, normalised
    pub throttle: f64,

    /// True if the unlimited demand was outside the throttle range.
    pub saturated: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SpeedReg {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Compute the throttle required to move `measured_speed` towards `target_speed`.
    ///
    /// A NaN demand gives zero throttle and is reported as saturated.
    pub fn regulate(&self, target_speed: f64, measured_speed: f64) -> SpeedRegOutput {
        let demand = (target_speed - measured_speed) * self.params.k_p;
        if demand.is_nan() {
            return SpeedRegOutput {
                throttle: 0.0,
                saturated: true,
            };
        }

        let throttle = clamp(demand, self.params.throttle_min, self.params.throttle_max);

        SpeedRegOutput {
            throttle,
            saturated: throttle != demand,
        }
    }

    /// Autopilot speed setpoint for the given predicted steering.
    ///
    /// A two level lookup, sharp predicted turns use the slower setpoint.
    pub fn autopilot_target(&self, predicted_steering: f64) -> f64 {
        if predicted_steering.abs() > self.params.steering_threshold {
            self.params.turn_target_speed
        } else {
            self.params.target_speed
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_throttle_saturation() {
        let sr = SpeedReg::new(Params::default());

        assert_eq!(
            sr.regulate(20.0, 0.0),
            SpeedRegOutput {
                throttle: 1.0,
                saturated: true
            }
        );
        assert_eq!(
            sr.regulate(0.0, 30.0),
            SpeedRegOutput {
                throttle: -1.0,
                saturated: true
            }
        );

        let out = sr.regulate(20.0, 18.0);
        assert!((out.throttle - 0.7).abs() < 1e-12);
        assert!(!out.saturated);
    }

    #[test]
    fn test_non_finite_speed() {
        let sr = SpeedReg::new(Params::default());

        assert_eq!(
            sr.regulate(20.0, f64::NAN),
            SpeedRegOutput {
                throttle: 0.0,
                saturated: true
            }
        );

        let out = sr.regulate(20.0, f64::NEG_INFINITY);
        assert_eq!(out.throttle, 1.0);
        assert!(out.saturated);
    }

    #[test]
    fn test_autopilot_target() {
        let sr = SpeedReg::new(Params::default());

        assert_eq!(sr.autopilot_target(0.1), 20.0);
        assert_eq!(sr.autopilot_target(-0.1), 20.0);
        assert_eq!(sr.autopilot_target(0.2), 15.0);
        assert_eq!(sr.autopilot_target(-0.2), 15.0);
    }
}
