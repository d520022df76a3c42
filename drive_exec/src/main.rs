//! Main drive executable entry point.
//!
//! # Architecture
//!
//! Everything that changes controller state runs on the main thread:
//!
//!     - Initialise the session, logging, parameters and the model
//!     - Main loop:
//!         - Operator events from the console or script
//!         - One simulator event through the telemetry dispatcher, which waits up to 10 ms
//!         - Tick archiving
//!
//! The console and the status publisher run in their own threads and are connected to the main
//! thread by bounded channels.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::sync_channel;
use structopt::StructOpt;

// Internal
use comms_if::{net::zmq, ui::UiEvent};
use drive_lib::{
    model::LinearModel,
    params::DriveExecParams,
    preprocess::FEATURE_LEN,
    sim_server::SimServer,
    status_server,
    telem_dispatch::{DispatchError, DispatchOutput, TelemetryDispatcher},
    ui_source::UiSource,
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Limit of the number of consecutive simulator link errors before the executable stops.
const MAX_LINK_ERROR_LIMIT: u64 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "drive_exec", about = "Drive a simulated car and train its autopilot live")]
struct Opt {
    /// Parameter file, relative to $LIVE_TRAINER_ROOT/params
    #[structopt(long, default_value = "drive_exec.toml")]
    params: String,

    /// Run a UI event script instead of the interactive console
    #[structopt(long, parse(from_os_str))]
    script: Option<PathBuf>,
}

/// One row of the tick archive.
#[derive(Serialize)]
struct TickRecord {
    time_s: f64,
    mode: String,
    measured_speed: f64,
    target_speed: f64,
    steering_angle: f64,
    throttle: f64,
    throttle_saturated: bool,
    inference_failed: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Live Trainer Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: DriveExecParams =
        util::params::load(&opt.params).wrap_err("Could not load drive exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE UI SOURCE ----

    let mut ui = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);
            UiSource::script(path).wrap_err("Failed to load script")?
        }
        None => {
            info!("No script provided, the console will be used\n");
            UiSource::console(params.ui_channel_bound)
        }
    };

    // ---- INITIALISE MODEL ----

    let model = LinearModel::load_or_zeros(
        params.model.weights_path.as_ref().map(|p| resolve(p)),
        FEATURE_LEN,
        params.model.learning_rate,
        resolve(&params.model.checkpoint_path),
    )
    .wrap_err("Failed to initialise the model")?;
    info!("Model initialised");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let sim_server = {
        let s = SimServer::new(&zmq_ctx, &params.sim_endpoint)
            .wrap_err("Failed to initialise SimServer")?;
        info!("SimServer initialised");
        s
    };

    let (status_tx, status_rx) = sync_channel(params.status_channel_bound.max(1));
    let status_thread =
        status_server::spawn(zmq_ctx.clone(), params.status_endpoint.clone(), status_rx);

    info!("Network initialisation complete");

    let mut dispatcher = TelemetryDispatcher::new(&params, sim_server, model, status_tx);

    let mut tick_archiver = match params.archive_ticks {
        true => Some(
            Archiver::from_path(&session, "drive/ticks.csv")
                .wrap_err("Failed to create the tick archive")?,
        ),
        false => None,
    };

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut link_errors = 0u64;

    let result: Result<(), Report> = 'main: loop {
        // ---- OPERATOR EVENTS ----

        for event in ui.pending() {
            if event == UiEvent::Quit {
                info!("Quit requested");
                break 'main Ok(());
            }

            // Rejections are logged by the mode manager and shown in the status
            dispatcher.handle_ui_event(event).ok();
        }

        // ---- SIMULATOR EVENTS ----

        match dispatcher.poll() {
            Ok(output) => {
                link_errors = 0;

                if let (Some(out), Some(arch)) = (output.as_ref(), tick_archiver.as_mut()) {
                    if let Err(e) = arch.serialise(TickRecord::new(out)) {
                        warn!("Could not archive tick: {}", e);
                    }
                }
            }
            Err(DispatchError::Link(e)) => {
                link_errors += 1;
                warn!("Simulator link error ({}): {}", link_errors, e);

                if link_errors >= MAX_LINK_ERROR_LIMIT {
                    break 'main Err(eyre!(
                        "{} consecutive simulator link errors, last: {}",
                        link_errors,
                        e
                    ));
                }
            }
            Err(e) => {
                error!("Fatal dispatch error: {}", e);
                break 'main Err(Report::new(e)).wrap_err("Telemetry dispatch failed");
            }
        }
    };

    // ---- SHUTDOWN ----

    // Also reached on fatal errors, the simulator must not keep the last throttle
    if let Err(e) = dispatcher.shutdown() {
        warn!("Could not send the neutral command: {}", e);
    }

    // Dropping the dispatcher closes the status channel and stops the status thread
    drop(dispatcher);
    if status_thread.join().is_err() {
        warn!("Status thread panicked");
    }

    session.exit();

    result
}

/// Resolve a path relative to the software root, absolute paths are kept as they are.
fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match host::get_sw_root() {
        Ok(root) => root.join(path),
        Err(_) => path.to_path_buf(),
    }
}

impl TickRecord {
    fn new(out: &DispatchOutput) -> Self {
        Self {
            time_s: session::get_elapsed_seconds(),
            mode: out.mode.to_string(),
            measured_speed: out.measured_speed,
            target_speed: out.target_speed,
            steering_angle: out.cmd.steering_angle,
            throttle: out.cmd.throttle,
            throttle_saturated: out.throttle_saturated,
            inference_failed: out.inference_failed,
        }
    }
}
