//! Implementations for the KinCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::{Direction, Params};
use util::maths::{clamp, decay_toward_zero};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematic controller state.
///
/// Holds the operator's steering and speed setpoints. Steering is normalised, `1.0` being the
/// vehicle's maximum steering angle.
#[derive(Debug, Clone)]
pub struct KinCtrl {
    params: Params,

    /// Steering change for one turn command, normalised
    turn_step: f64,

    steering_angle: f64,

    speed: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl KinCtrl {
    /// Create a new controller with zero steering and zero speed.
    ///
    /// `max_steering_angle_deg` converts the turn rate into normalised steering.
    pub fn new(params: Params, max_steering_angle_deg: f64) -> Self {
        let turn_step = if max_steering_angle_deg > 0.0 {
            params.turn_rate_deg / max_steering_angle_deg
        } else {
            0.0
        };

        Self {
            params,
            turn_step,
            steering_angle: 0.0,
            speed: 0.0,
        }
    }

    /// Step the steering setpoint in the given direction, saturating at the steering limit.
    pub fn turn(&mut self, direction: Direction) {
        let limit = self.params.steering_limit.abs();

        self.steering_angle = clamp(
            self.steering_angle + direction.sign() * self.turn_step,
            -limit,
            limit,
        );

        trace!("KinCtrl steering setpoint: {:.4}", self.steering_angle);
    }

    /// Step the speed setpoint by one unit, saturating in `[0, speed_limit]`.
    pub fn speed_control(&mut self, direction: Direction) {
        self.speed = clamp(
            self.speed + direction.sign(),
            0.0,
            self.params.speed_limit.max(0.0),
        );

        trace!("KinCtrl speed setpoint: {:.1}", self.speed);
    }

    /// Apply one tick of centering torque.
    pub fn center_steering(&mut self) {
        self.steering_angle =
            decay_toward_zero(self.steering_angle, self.params.centering_torque.abs());
    }

    pub fn reset_steering(&mut self) {
        self.steering_angle = 0.0;
    }

    /// Overwrite the steering setpoint, used to follow the autopilot so that a manual takeover
    /// starts from the last predicted steering.
    pub fn set_steering(&mut self, steering_angle: f64) {
        let limit = self.params.steering_limit.abs();
        self.steering_angle = clamp(steering_angle, -limit, limit);
    }

    pub fn steering_angle(&self) -> f64 {
        self.steering_angle
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
