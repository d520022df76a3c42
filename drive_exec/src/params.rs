//! # Drive Executable Parameters
//!
//! This module provide parameters for the drive executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{batch_acc, kin_ctrl, model, speed_reg};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveExecParams {
    /// Network endpoint the simulator bridge connects to
    pub sim_endpoint: String,

    /// Network endpoint status reports are published on
    pub status_endpoint: String,

    /// Steering angle of the vehicle at a normalised steering of 1.
    ///
    /// Units: degrees
    pub max_steering_angle_deg: f64,

    /// Write a CSV row for every telemetry tick
    pub archive_ticks: bool,

    /// Capacity of the UI event queue
    pub ui_channel_bound: usize,

    /// Capacity of the status report queue, reports are dropped when it is full
    pub status_channel_bound: usize,

    pub kin_ctrl: kin_ctrl::Params,

    pub speed_reg: speed_reg::Params,

    pub batch: batch_acc::Params,

    pub model: model::Params,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for DriveExecParams {
    fn default() -> Self {
        Self {
            sim_endpoint: "tcp://*:4567".into(),
            status_endpoint: "tcp://*:4568".into(),
            max_steering_angle_deg: 25.0,
            archive_ticks: true,
            ui_channel_bound: 64,
            status_channel_bound: 8,
            kin_ctrl: kin_ctrl::Params::default(),
            speed_reg: speed_reg::Params::default(),
            batch: batch_acc::Params::default(),
            model: model::Params::default(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use batch_acc::TrainFailPolicy;

    #[test]
    fn test_partial_toml() {
        let p: DriveExecParams = util::params::from_toml_str(
            r#"
            sim_endpoint = "tcp://*:5000"

            [speed_reg]
            k_p = 0.2

            [batch]
            fail_policy = "fatal"
            "#,
        )
        .unwrap();

        assert_eq!(p.sim_endpoint, "tcp://*:5000");
        assert_eq!(p.speed_reg.k_p, 0.2);
        assert_eq!(p.speed_reg.target_speed, 20.0);
        assert_eq!(p.batch.fail_policy, TrainFailPolicy::Fatal);
        assert_eq!(p.batch.training_batch_size, 16);
        assert_eq!(p.kin_ctrl.speed_limit, 30.0);
    }
}
