//! # Preprocessing Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::{
    sim::{ControlCmd, Telemetry},
    ui::UiEvent,
};
use drive_lib::{
    model::LinearModel,
    params::DriveExecParams,
    preprocess::{preprocess, FEATURE_LEN},
    telem_dispatch::{
        LinkError, LinkEvent, SimLink, StatusReport, StatusSink, TelemetryDispatcher,
    },
};
use image::{Rgb, RgbImage};

/// Link which discards everything sent to it.
struct NullLink;

impl SimLink for NullLink {
    fn next_event(&mut self) -> Result<Option<LinkEvent>, LinkError> {
        Ok(None)
    }

    fn send_control(&mut self, _cmd: ControlCmd) -> Result<(), LinkError> {
        Ok(())
    }
}

struct NullStatus;

impl StatusSink for NullStatus {
    fn publish(&mut self, _report: StatusReport) {}
}

fn camera_image() -> RgbImage {
    RgbImage::from_fn(320, 160, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
}

fn preprocess_benchmark(c: &mut Criterion) {
    let image = camera_image();

    c.bench_function("preprocess", |b| b.iter(|| preprocess(&image).unwrap()));

    // ---- Full autopilot tick ----

    let params = DriveExecParams::default();
    let model = LinearModel::zeros(
        FEATURE_LEN,
        params.model.learning_rate,
        "bench_checkpoint.json",
    );
    let mut dispatcher = TelemetryDispatcher::new(&params, NullLink, model, NullStatus);

    dispatcher.handle_ui_event(UiEvent::ToggleMode).unwrap();
    dispatcher.handle_ui_event(UiEvent::ToggleMode).unwrap();

    let tm = Telemetry {
        steering_angle: 0.0,
        throttle: 0.0,
        speed: 15.0,
        image,
    };

    c.bench_function("autopilot tick", |b| {
        b.iter(|| dispatcher.on_telemetry(&tm).unwrap())
    });
}

criterion_group!(benches, preprocess_benchmark);
criterion_main!(benches);
