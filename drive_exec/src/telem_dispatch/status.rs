//! Status reporting for the dispatcher

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{SyncSender, TrySendError};

// Internal
use super::StatusSink;
use crate::mode_mgr::Mode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Snapshot of the controller for display to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub mode: Mode,

    pub is_training: bool,

    /// Units: mph
    pub speed_setpoint: f64,

    /// Units: mph
    pub measured_speed: f64,

    /// Units: degrees
    pub steering_angle_deg: f64,

    pub throttle: f64,

    pub throttle_saturated: bool,

    /// Fraction of time spent in autonomous mode since the simulator connected
    pub autonomy_rating: f64,

    /// Samples waiting in the training batch
    pub batch_len: usize,

    pub batches_trained: usize,

    pub last_loss: Option<f64>,

    /// Most recent rejected mode change
    pub last_rejected: Option<String>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Autonomous => "Autopilot engaged",
            Mode::Manual | Mode::Training => "Manual override",
            Mode::Stopped => "Stopped",
        };

        writeln!(f, "{}", mode)?;
        writeln!(f, "Autonomous rating: {:.2}%", self.autonomy_rating * 100.0)?;

        if self.is_training {
            write!(f, "Training neural net ... ({} samples pending", self.batch_len)?;
            if let Some(loss) = self.last_loss {
                write!(f, ", last loss {:.4}", loss)?;
            }
            writeln!(f, ")")?;
        }

        if let Some(ref r) = self.last_rejected {
            writeln!(f, "Rejected: {}", r)?;
        }

        write!(
            f,
            "Speed = {:4.2} mph, Steering angle = {:4.2} deg",
            self.speed_setpoint, self.steering_angle_deg
        )
    }
}

impl StatusSink for SyncSender<StatusReport> {
    fn publish(&mut self, report: StatusReport) {
        match self.try_send(report) {
            Ok(_) => (),
            Err(TrySendError::Full(_)) => trace!("Status queue full, report dropped"),
            Err(TrySendError::Disconnected(_)) => trace!("Status receiver gone, report dropped"),
        }
    }
}

impl StatusSink for Vec<StatusReport> {
    fn publish(&mut self, report: StatusReport) {
        self.push(report)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::sync_channel;

    fn report() -> StatusReport {
        StatusReport {
            mode: Mode::Training,
            is_training: true,
            speed_setpoint: 12.0,
            measured_speed: 11.5,
            steering_angle_deg: -2.5,
            throttle: 0.175,
            throttle_saturated: false,
            autonomy_rating: 0.4321,
            batch_len: 5,
            batches_trained: 2,
            last_loss: None,
            last_rejected: None,
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            report().to_string(),
            "Manual override\n\
             Autonomous rating: 43.21%\n\
             Training neural net ... (5 samples pending)\n\
             Speed = 12.00 mph, Steering angle = -2.50 deg"
        );

        let auto = StatusReport {
            mode: Mode::Autonomous,
            is_training: false,
            ..report()
        };
        assert_eq!(
            auto.to_string(),
            "Autopilot engaged\n\
             Autonomous rating: 43.21%\n\
             Speed = 12.00 mph, Steering angle = -2.50 deg"
        );
    }

    #[test]
    fn test_sender_never_blocks() {
        let (mut tx, rx) = sync_channel(1);

        tx.publish(report());
        tx.publish(report());
        assert_eq!(rx.try_iter().count(), 1);

        drop(rx);
        tx.publish(report());
    }
}
