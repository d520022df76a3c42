//! Dispatcher scenarios driven through mock collaborators.

use std::cell::Cell;
use std::collections::VecDeque;

use comms_if::{
    sim::{ControlCmd, SimMsgParseError, Telemetry},
    ui::UiEvent,
};
use drive_lib::{
    batch_acc::TrainFailPolicy,
    mode_mgr::{Mode, ModeError, ModeTrigger},
    model::{ModelError, OnlineTrainer, SteeringPredictor},
    params::DriveExecParams,
    preprocess::Features,
    telem_dispatch::{
        DispatchError, LinkError, LinkEvent, SimLink, StatusReport, TelemetryDispatcher,
    },
};
use image::RgbImage;

// ------------------------------------------------------------------------------------------------
// MOCKS
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
struct MockLink {
    events: VecDeque<Result<Option<LinkEvent>, LinkError>>,
    sent: Vec<ControlCmd>,
}

impl SimLink for MockLink {
    fn next_event(&mut self) -> Result<Option<LinkEvent>, LinkError> {
        self.events.pop_front().unwrap_or(Ok(None))
    }

    fn send_control(&mut self, cmd: ControlCmd) -> Result<(), LinkError> {
        self.sent.push(cmd);
        Ok(())
    }
}

/// Predicts a fixed value, or fails if the prediction is `None`.
struct MockModel {
    prediction: Cell<Option<f64>>,
    fail_train: bool,
    steps: usize,
    batch_lens: Vec<usize>,
}

impl MockModel {
    fn new(prediction: f64) -> Self {
        Self {
            prediction: Cell::new(Some(prediction)),
            fail_train: false,
            steps: 0,
            batch_lens: vec![],
        }
    }
}

impl SteeringPredictor for MockModel {
    fn predict(&self, _features: &Features) -> Result<f64, ModelError> {
        self.prediction
            .get()
            .ok_or_else(|| ModelError::Other("model offline".into()))
    }
}

impl OnlineTrainer for MockModel {
    fn train_step(&mut self, _features: &[Features], labels: &[f64]) -> Result<f64, ModelError> {
        self.batch_lens.push(labels.len());
        if self.fail_train {
            return Err(ModelError::Other("out of memory".into()));
        }
        self.steps += 1;
        Ok(0.01)
    }

    fn save_checkpoint(&mut self) -> Result<(), ModelError> {
        Ok(())
    }
}

type Dispatcher = TelemetryDispatcher<MockLink, MockModel, Vec<StatusReport>>;

// ------------------------------------------------------------------------------------------------
// HELPERS
// ------------------------------------------------------------------------------------------------

fn dispatcher_with(params: DriveExecParams, model: MockModel) -> Dispatcher {
    TelemetryDispatcher::new(&params, MockLink::default(), model, Vec::new())
}

fn dispatcher(prediction: f64) -> Dispatcher {
    dispatcher_with(DriveExecParams::default(), MockModel::new(prediction))
}

fn telemetry(speed: f64) -> Telemetry {
    Telemetry {
        steering_angle: 0.0,
        throttle: 0.0,
        speed,
        image: RgbImage::new(320, 160),
    }
}

fn ui(d: &mut Dispatcher, events: &[UiEvent]) {
    for e in events {
        d.handle_ui_event(*e).ok();
    }
}

fn cmd(steering_angle: f64, throttle: f64) -> ControlCmd {
    ControlCmd {
        steering_angle,
        throttle,
    }
}

fn assert_cmd_eq(a: ControlCmd, b: ControlCmd) {
    assert!(
        (a.steering_angle - b.steering_angle).abs() < 1e-9 && (a.throttle - b.throttle).abs() < 1e-9,
        "{:?} != {:?}",
        a,
        b
    );
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[test]
fn connect_sends_neutral_before_telemetry() {
    let mut d = dispatcher(0.0);
    d.handle_ui_event(UiEvent::ToggleMode).unwrap();

    let mut link = MockLink::default();
    link.events.push_back(Ok(Some(LinkEvent::Connected)));
    link.events
        .push_back(Ok(Some(LinkEvent::Telemetry(telemetry(0.0)))));
    let mut d2 = TelemetryDispatcher::new(
        &DriveExecParams::default(),
        link,
        MockModel::new(0.0),
        Vec::new(),
    );

    assert_eq!(d2.poll().unwrap(), None);
    assert!(d2.is_connected());
    assert_eq!(d2.link().sent, vec![ControlCmd::neutral()]);

    assert!(d2.poll().unwrap().is_some());
    assert_eq!(d2.link().sent.len(), 2);

    // Telemetry without a connect event connects implicitly
    d.on_telemetry(&telemetry(0.0)).unwrap();
    assert_eq!(d.link().sent[0], ControlCmd::neutral());
    assert_eq!(d.link().sent.len(), 2);
}

#[test]
fn stopped_emits_zero_command() {
    let mut d = dispatcher(0.3);
    assert_eq!(d.mode(), Mode::Stopped);

    // Setpoints from the operator are ignored while stopped
    ui(&mut d, &[UiEvent::SpeedUp, UiEvent::SpeedUp, UiEvent::TurnRight]);

    let out = d.on_telemetry(&telemetry(5.0)).unwrap();
    assert_eq!(out.cmd, ControlCmd::neutral());
    assert_eq!(out.mode, Mode::Stopped);
}

#[test]
fn autonomous_uses_prediction() {
    let mut d = dispatcher(0.1);

    // Stopped -> Manual -> Autonomous
    ui(&mut d, &[UiEvent::ToggleMode, UiEvent::ToggleMode]);
    assert_eq!(d.mode(), Mode::Autonomous);

    // Straight ahead, target 20 mph
    let out = d.on_telemetry(&telemetry(15.0)).unwrap();
    assert_eq!(out.target_speed, 20.0);
    assert_cmd_eq(out.cmd, cmd(0.1, ((20.0 - 15.0) * 0.35_f64).min(1.0)));
    assert!(out.throttle_saturated);
    assert_eq!(*d.link().sent.last().unwrap(), out.cmd);

    // Close to target, unsaturated
    let out = d.on_telemetry(&telemetry(18.0)).unwrap();
    assert_cmd_eq(out.cmd, cmd(0.1, 0.7));
    assert!(!out.throttle_saturated);

    // Sharp turn, target drops to 15 mph
    d.model().prediction.set(Some(-0.2));
    let out = d.on_telemetry(&telemetry(15.0)).unwrap();
    assert_eq!(out.target_speed, 15.0);
    assert_cmd_eq(out.cmd, cmd(-0.2, 0.0));
}

#[test]
fn inference_failure_sends_safe_command() {
    let mut d = dispatcher(0.1);
    ui(&mut d, &[UiEvent::ToggleMode, UiEvent::ToggleMode]);

    d.on_telemetry(&telemetry(10.0)).unwrap();

    d.model().prediction.set(None);
    let out = d.on_telemetry(&telemetry(10.0)).unwrap();
    assert!(out.inference_failed);
    assert_cmd_eq(out.cmd, cmd(0.1, 0.0));

    // An unusable image counts as a failed inference too
    d.model().prediction.set(Some(0.3));
    let mut small = telemetry(10.0);
    small.image = RgbImage::new(64, 64);
    let out = d.on_telemetry(&small).unwrap();
    assert!(out.inference_failed);
    assert_cmd_eq(out.cmd, cmd(0.1, 0.0));

    assert_eq!(d.mode(), Mode::Autonomous);
}

#[test]
fn manual_steering_and_centering() {
    let mut d = dispatcher(0.5);
    ui(
        &mut d,
        &[
            UiEvent::ToggleMode,
            UiEvent::SpeedUp,
            UiEvent::SpeedUp,
            UiEvent::SpeedUp,
            UiEvent::SpeedUp,
            UiEvent::SpeedUp,
            UiEvent::TurnRight,
            UiEvent::TurnRight,
        ],
    );
    assert_eq!(d.mode(), Mode::Manual);

    // Command uses the steering before centering is applied
    let out = d.on_telemetry(&telemetry(3.0)).unwrap();
    assert_cmd_eq(out.cmd, cmd(0.04, 0.7));
    assert_eq!(out.target_speed, 5.0);
    assert!((d.kin_ctrl().steering_angle() - (0.04 - 0.0004)).abs() < 1e-12);

    ui(&mut d, &[UiEvent::ResetSteering]);
    let out = d.on_telemetry(&telemetry(5.0)).unwrap();
    assert_cmd_eq(out.cmd, cmd(0.0, 0.0));
}

#[test]
fn training_runs_one_step_per_batch() {
    let mut d = dispatcher(0.0);
    ui(&mut d, &[UiEvent::ToggleMode, UiEvent::ToggleRecording]);
    assert_eq!(d.mode(), Mode::Training);

    for i in 0..15 {
        let out = d.on_telemetry(&telemetry(0.0)).unwrap();
        assert!(out.train_report.is_none());
        assert_eq!(d.batch_acc().len(), i + 1);
    }

    let out = d.on_telemetry(&telemetry(0.0)).unwrap();
    let report = out.train_report.expect("batch should have trained");
    assert_eq!(report.index, 0);
    assert_eq!(report.labels.len(), 16);
    assert_eq!(d.model().steps, 1);
    assert!(d.batch_acc().is_empty());

    d.on_telemetry(&telemetry(0.0)).unwrap();
    assert_eq!(d.batch_acc().len(), 1);
    assert_eq!(d.model().steps, 1);

    let status = d.status_sink().last().unwrap();
    assert!(status.is_training);
    assert_eq!(status.batches_trained, 1);
    assert_eq!(status.last_loss, Some(0.01));

    // Samples are only recorded in training
    ui(&mut d, &[UiEvent::ToggleRecording]);
    assert_eq!(d.mode(), Mode::Manual);
    d.on_telemetry(&telemetry(0.0)).unwrap();
    assert_eq!(d.batch_acc().len(), 1);
}

#[test]
fn training_labels_are_operator_steering() {
    let mut d = dispatcher(0.0);
    ui(
        &mut d,
        &[
            UiEvent::ToggleMode,
            UiEvent::ToggleRecording,
            UiEvent::TurnLeft,
        ],
    );

    let mut report = None;
    for _ in 0..16 {
        report = d.on_telemetry(&telemetry(0.0)).unwrap().train_report;
    }

    // Each label is the steering sent on that tick, decaying towards zero
    let labels = report.expect("batch should have trained").labels;
    for (k, label) in labels.iter().enumerate() {
        assert!((label - (-0.02 + k as f64 * 0.0004)).abs() < 1e-9);
    }
    assert_eq!(d.model().batch_lens, vec![16]);
}

#[test]
fn recording_rejected_outside_manual() {
    let mut d = dispatcher(0.0);

    assert_eq!(
        d.handle_ui_event(UiEvent::ToggleRecording),
        Err(ModeError::InvalidTransition {
            from: Mode::Stopped,
            trigger: ModeTrigger::StartTraining
        })
    );
    assert_eq!(d.mode(), Mode::Stopped);
    assert!(d.status_sink().last().unwrap().last_rejected.is_some());

    // A successful change clears the rejection
    d.handle_ui_event(UiEvent::ToggleMode).unwrap();
    assert!(d.status_sink().last().unwrap().last_rejected.is_none());
}

#[test]
fn failed_training_recovers_to_manual() {
    let mut model = MockModel::new(0.0);
    model.fail_train = true;
    let mut d = dispatcher_with(DriveExecParams::default(), model);
    ui(&mut d, &[UiEvent::ToggleMode, UiEvent::ToggleRecording]);

    for _ in 0..15 {
        d.on_telemetry(&telemetry(0.0)).unwrap();
    }
    let out = d.on_telemetry(&telemetry(0.0)).unwrap();

    assert_eq!(out.dropped_samples, Some(16));
    assert_eq!(d.mode(), Mode::Manual);
    assert!(d.batch_acc().is_empty());

    // Still driving
    assert_eq!(d.link().sent.len(), 17);
}

#[test]
fn failed_training_is_fatal_when_configured() {
    let mut params = DriveExecParams::default();
    params.batch.fail_policy = TrainFailPolicy::Fatal;
    let mut model = MockModel::new(0.0);
    model.fail_train = true;
    let mut d = dispatcher_with(params, model);
    ui(&mut d, &[UiEvent::ToggleMode, UiEvent::ToggleRecording]);

    for _ in 0..15 {
        d.on_telemetry(&telemetry(0.0)).unwrap();
    }

    assert!(matches!(
        d.on_telemetry(&telemetry(0.0)),
        Err(DispatchError::Training(_))
    ));
    assert_eq!(d.batch_acc().len(), 16);
    assert_eq!(d.mode(), Mode::Training);
}

#[test]
fn disconnect_latches_neutral_and_keeps_state() {
    let mut d = dispatcher(0.2);
    ui(&mut d, &[UiEvent::ToggleMode, UiEvent::ToggleMode]);

    d.on_telemetry(&telemetry(10.0)).unwrap();
    let sent = d.link().sent.len();

    d.on_disconnect();
    assert!(!d.is_connected());
    assert_eq!(d.last_cmd(), ControlCmd::neutral());
    assert_eq!(d.mode(), Mode::Autonomous);
    assert_eq!(d.link().sent.len(), sent);

    // Reconnection sends neutral first again
    d.on_connect().unwrap();
    assert_eq!(*d.link().sent.last().unwrap(), ControlCmd::neutral());
    assert_eq!(d.status_sink().last().unwrap().mode, Mode::Autonomous);
}

#[test]
fn malformed_message_still_answered() {
    let mut link = MockLink::default();
    link.events.push_back(Ok(Some(LinkEvent::Connected)));
    link.events.push_back(Err(LinkError::Malformed(
        SimMsgParseError::InvalidNumber("speed", "fast".into()),
    )));
    link.events
        .push_back(Err(LinkError::Transport("socket closed".into())));

    let mut d = TelemetryDispatcher::new(
        &DriveExecParams::default(),
        link,
        MockModel::new(0.0),
        Vec::new(),
    );

    d.poll().unwrap();
    assert_eq!(d.poll().unwrap(), None);
    assert_eq!(d.link().sent.len(), 2);

    assert!(matches!(d.poll(), Err(DispatchError::Link(_))));
    assert_eq!(d.poll().unwrap(), None);
}

#[test]
fn emergency_stop_from_any_mode() {
    for setup in [
        vec![],
        vec![UiEvent::ToggleMode],
        vec![UiEvent::ToggleMode, UiEvent::ToggleRecording],
        vec![UiEvent::ToggleMode, UiEvent::ToggleMode],
    ]
    .iter()
    {
        let mut d = dispatcher(0.4);
        ui(&mut d, setup);

        d.handle_ui_event(UiEvent::EmergencyStop).unwrap();
        assert_eq!(d.mode(), Mode::Stopped);

        let out = d.on_telemetry(&telemetry(12.0)).unwrap();
        assert_eq!(out.cmd, ControlCmd::neutral());
    }
}

#[test]
fn shutdown_parks_the_vehicle() {
    let mut params = DriveExecParams::default();
    params.batch.fail_policy = TrainFailPolicy::Fatal;
    let mut model = MockModel::new(0.0);
    model.fail_train = true;
    let mut d = dispatcher_with(params, model);
    ui(&mut d, &[UiEvent::ToggleMode, UiEvent::ToggleRecording]);
    ui(&mut d, &[UiEvent::SpeedUp; 10]);

    for _ in 0..15 {
        d.on_telemetry(&telemetry(0.0)).unwrap();
    }
    assert!(d.last_cmd().throttle > 0.0);
    assert!(d.on_telemetry(&telemetry(0.0)).is_err());

    let sent = d.link().sent.len();
    d.shutdown().unwrap();
    assert_eq!(d.link().sent.len(), sent + 1);
    assert_eq!(*d.link().sent.last().unwrap(), ControlCmd::neutral());

    // Nothing to park without a simulator
    d.on_disconnect();
    d.shutdown().unwrap();
    assert_eq!(d.link().sent.len(), sent + 1);
}
