//! Implementations for the TelemetryDispatcher state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::{
    sim::{ControlCmd, Telemetry},
    ui::UiEvent,
};
use log::{debug, error, info, trace, warn};
use std::time::Instant;

// Internal
use super::{
    DispatchError, DispatchOutput, LinkError, LinkEvent, SimLink, StatusReport, StatusSink,
};
use crate::batch_acc::{BatchAccumulator, RecordOutcome, Sample};
use crate::kin_ctrl::{Direction, KinCtrl};
use crate::mode_mgr::{Mode, ModeError, ModeMgr, ModeTrigger};
use crate::model::DriveModel;
use crate::params::DriveExecParams;
use crate::preprocess::preprocess;
use crate::speed_reg::{SpeedReg, SpeedRegOutput};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry dispatcher.
///
/// Owns the controllers, the mode manager, the training batch and the collaborators. Nothing else
/// holds a reference to them, so handling one event can never interleave with another.
pub struct TelemetryDispatcher<L, M, S> {
    link: L,
    model: M,
    status: S,

    kin_ctrl: KinCtrl,
    speed_reg: SpeedReg,
    mode_mgr: ModeMgr,
    batch_acc: BatchAccumulator,

    max_steering_angle_deg: f64,

    connected: bool,

    /// Last command sent, or the neutral command latched on disconnect
    last_cmd: ControlCmd,

    last_measured_speed: f64,
    last_target_speed: f64,
    last_speed_out: SpeedRegOutput,

    last_rejected: Option<ModeError>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<L, M, S> TelemetryDispatcher<L, M, S>
where
    L: SimLink,
    M: DriveModel,
    S: StatusSink,
{
    /// Create a new dispatcher in the `Stopped` mode.
    pub fn new(params: &DriveExecParams, link: L, model: M, status: S) -> Self {
        Self {
            link,
            model,
            status,
            kin_ctrl: KinCtrl::new(params.kin_ctrl.clone(), params.max_steering_angle_deg),
            speed_reg: SpeedReg::new(params.speed_reg.clone()),
            mode_mgr: ModeMgr::new(),
            batch_acc: BatchAccumulator::new(params.batch.clone()),
            max_steering_angle_deg: params.max_steering_angle_deg,
            connected: false,
            last_cmd: ControlCmd::neutral(),
            last_measured_speed: 0.0,
            last_target_speed: 0.0,
            last_speed_out: SpeedRegOutput::default(),
            last_rejected: None,
        }
    }

    /// Read at most one event from the simulator link and handle it.
    ///
    /// Returns the dispatch output if the event was telemetry.
    pub fn poll(&mut self) -> Result<Option<DispatchOutput>, DispatchError> {
        match self.link.next_event() {
            Ok(None) => Ok(None),
            Ok(Some(LinkEvent::Connected)) => {
                self.on_connect()?;
                Ok(None)
            }
            Ok(Some(LinkEvent::Disconnected)) => {
                self.on_disconnect();
                Ok(None)
            }
            Ok(Some(LinkEvent::Telemetry(tm))) => self.on_telemetry(&tm).map(Some),
            Err(e @ LinkError::Malformed(_)) | Err(e @ LinkError::NonUtf8) => {
                // The simulator still expects an answer
                warn!("Discarding malformed simulator message: {}", e);
                if self.connected {
                    let cmd = self.safe_cmd();
                    self.send(cmd)?;
                }
                Ok(None)
            }
            Err(e) => Err(DispatchError::Link(e)),
        }
    }

    /// Handle a new simulator connection.
    ///
    /// Sends the neutral command before any telemetry is processed and restarts the autonomy
    /// rating.
    pub fn on_connect(&mut self) -> Result<(), DispatchError> {
        info!("Simulator connected");

        self.connected = true;
        self.mode_mgr.on_connect(Instant::now());

        self.send(ControlCmd::neutral())?;
        self.publish_status();

        Ok(())
    }

    /// Handle the loss of the simulator.
    ///
    /// The neutral command is latched and all other state is kept for the next connection.
    pub fn on_disconnect(&mut self) {
        if self.connected {
            warn!("Simulator disconnected, waiting for reconnection");
        }

        self.connected = false;
        self.last_cmd = ControlCmd::neutral();
        self.publish_status();
    }

    /// Park the vehicle before the process exits.
    ///
    /// Sends the neutral command if a simulator is connected, so it does not keep driving on the
    /// last throttle.
    pub fn shutdown(&mut self) -> Result<(), DispatchError> {
        if !self.connected {
            return Ok(());
        }

        info!("Sending neutral command before shutdown");
        self.send(ControlCmd::neutral())
    }

    /// Handle one telemetry event, sending exactly one command back to the simulator.
    pub fn on_telemetry(&mut self, tm: &Telemetry) -> Result<DispatchOutput, DispatchError> {
        // Telemetry means a simulator is there, even if the connection was never announced
        if !self.connected {
            self.on_connect()?;
        }

        let mode = self.mode_mgr.mode();
        self.last_measured_speed = tm.speed;

        let mut output = DispatchOutput {
            cmd: ControlCmd::neutral(),
            mode,
            measured_speed: tm.speed,
            target_speed: 0.0,
            throttle_saturated: false,
            inference_failed: false,
            train_report: None,
            dropped_samples: None,
        };

        match mode {
            Mode::Stopped => {
                self.last_speed_out = SpeedRegOutput::default();
            }
            Mode::Autonomous => match self.predict(tm) {
                Some(pred) => {
                    let steering = clamp(pred, -1.0, 1.0);
                    self.kin_ctrl.set_steering(steering);

                    output.target_speed = self.speed_reg.autopilot_target(steering);
                    self.last_speed_out = self.speed_reg.regulate(output.target_speed, tm.speed);

                    output.cmd = ControlCmd {
                        steering_angle: steering,
                        throttle: self.last_speed_out.throttle,
                    };
                }
                None => {
                    output.inference_failed = true;
                    self.last_speed_out = SpeedRegOutput::default();
                    output.cmd = self.safe_cmd();
                }
            },
            Mode::Manual | Mode::Training => {
                let steering = self.kin_ctrl.steering_angle();

                if mode == Mode::Training {
                    self.record(tm, steering, &mut output)?;
                }

                self.kin_ctrl.center_steering();

                output.target_speed = self.kin_ctrl.speed();
                self.last_speed_out = self.speed_reg.regulate(output.target_speed, tm.speed);

                output.cmd = ControlCmd {
                    steering_angle: steering,
                    throttle: self.last_speed_out.throttle,
                };
            }
        }

        output.throttle_saturated = self.last_speed_out.saturated;
        self.last_target_speed = output.target_speed;

        trace!(
            "{} tick: speed {:.2} -> steering {:.4}, throttle {:.3}",
            mode,
            tm.speed,
            output.cmd.steering_angle,
            output.cmd.throttle
        );

        self.send(output.cmd)?;
        self.publish_status();

        Ok(output)
    }

    /// Handle an operator event.
    ///
    /// A rejected mode change is returned as an error but changes nothing, it is also kept for the
    /// status report.
    pub fn handle_ui_event(&mut self, event: UiEvent) -> Result<(), ModeError> {
        debug!("UI event: {:?}", event);

        let mode = self.mode_mgr.mode();

        let trigger = match event {
            UiEvent::TurnLeft => {
                self.kin_ctrl.turn(Direction::Negative);
                None
            }
            UiEvent::TurnRight => {
                self.kin_ctrl.turn(Direction::Positive);
                None
            }
            UiEvent::SpeedUp => {
                self.kin_ctrl.speed_control(Direction::Positive);
                None
            }
            UiEvent::SlowDown => {
                self.kin_ctrl.speed_control(Direction::Negative);
                None
            }
            UiEvent::ResetSteering => {
                self.kin_ctrl.reset_steering();
                None
            }
            UiEvent::ToggleMode => Some(match mode {
                Mode::Manual | Mode::Training => ModeTrigger::EngageAutopilot,
                Mode::Autonomous | Mode::Stopped => ModeTrigger::Override,
            }),
            // Only Manual and Training pass the guard, the trigger picked for the others is
            // there to be rejected
            UiEvent::ToggleRecording => Some(match mode {
                Mode::Training => ModeTrigger::StopTraining,
                _ => ModeTrigger::StartTraining,
            }),
            UiEvent::EmergencyStop => Some(ModeTrigger::EmergencyStop),
            UiEvent::Quit => None,
        };

        let result = match trigger {
            Some(t) => self.request_mode(t).map(|_| ()),
            None => Ok(()),
        };

        self.publish_status();

        result
    }

    /// Build the current status report.
    pub fn status_report(&self) -> StatusReport {
        let mode = self.mode_mgr.mode();

        let (speed_setpoint, steering) = match mode {
            Mode::Autonomous => (self.last_target_speed, self.last_cmd.steering_angle),
            Mode::Stopped => (0.0, 0.0),
            Mode::Manual | Mode::Training => {
                (self.kin_ctrl.speed(), self.kin_ctrl.steering_angle())
            }
        };

        StatusReport {
            mode,
            is_training: mode == Mode::Training,
            speed_setpoint,
            measured_speed: self.last_measured_speed,
            steering_angle_deg: steering * self.max_steering_angle_deg,
            throttle: self.last_cmd.throttle,
            throttle_saturated: self.last_speed_out.saturated,
            autonomy_rating: self.mode_mgr.autonomy_rating(Instant::now()),
            batch_len: self.batch_acc.len(),
            batches_trained: self.batch_acc.batches_trained(),
            last_loss: self.batch_acc.last_loss(),
            last_rejected: self.last_rejected.map(|e| e.to_string()),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode_mgr.mode()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_cmd(&self) -> ControlCmd {
        self.last_cmd
    }

    pub fn kin_ctrl(&self) -> &KinCtrl {
        &self.kin_ctrl
    }

    pub fn batch_acc(&self) -> &BatchAccumulator {
        &self.batch_acc
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn status_sink(&self) -> &S {
        &self.status
    }

    // ---- PRIVATE ----

    fn request_mode(&mut self, trigger: ModeTrigger) -> Result<Mode, ModeError> {
        match self.mode_mgr.request(trigger, Instant::now()) {
            Ok(m) => {
                self.last_rejected = None;
                Ok(m)
            }
            Err(e) => {
                self.last_rejected = Some(e);
                Err(e)
            }
        }
    }

    /// Run the model on the telemetry image, `None` on any failure.
    fn predict(&mut self, tm: &Telemetry) -> Option<f64> {
        let features = match preprocess(&tm.image) {
            Ok(f) => f,
            Err(e) => {
                warn!("Inference failed, could not preprocess image: {}", e);
                return None;
            }
        };

        match self.model.predict(&features) {
            Ok(p) if p.is_finite() => Some(p),
            Ok(p) => {
                warn!("Inference failed, model predicted {}", p);
                None
            }
            Err(e) => {
                warn!("Inference failed: {}", e);
                None
            }
        }
    }

    /// Record a training sample labelled with the operator's steering.
    fn record(
        &mut self,
        tm: &Telemetry,
        steering: f64,
        output: &mut DispatchOutput,
    ) -> Result<(), DispatchError> {
        let features = match preprocess(&tm.image) {
            Ok(f) => f,
            Err(e) => {
                warn!("Training sample skipped: {}", e);
                return Ok(());
            }
        };

        let sample = Sample {
            features,
            label: steering,
        };

        match self
            .batch_acc
            .record(Mode::Training, sample, &mut self.model)
            .map_err(DispatchError::Training)?
        {
            RecordOutcome::Trained(report) => {
                util::session::save(
                    format!("batches/batch_{:04}.json", report.index),
                    report.clone(),
                );
                output.train_report = Some(report);
            }
            RecordOutcome::Dropped { len } => {
                error!("Training disabled after a failed step");
                output.dropped_samples = Some(len);
                if let Err(e) = self.request_mode(ModeTrigger::StopTraining) {
                    warn!("Could not leave training mode: {}", e);
                }
            }
            RecordOutcome::Pending { .. } | RecordOutcome::Ignored => (),
        }

        Ok(())
    }

    /// Last steering with zero throttle.
    fn safe_cmd(&self) -> ControlCmd {
        ControlCmd {
            steering_angle: self.last_cmd.steering_angle,
            throttle: 0.0,
        }
    }

    fn send(&mut self, cmd: ControlCmd) -> Result<(), DispatchError> {
        self.last_cmd = cmd;
        self.link.send_control(cmd).map_err(DispatchError::Link)
    }

    fn publish_status(&mut self) {
        let report = self.status_report();
        self.status.publish(report);
    }
}
