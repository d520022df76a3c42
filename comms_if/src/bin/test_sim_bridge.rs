//! Fake simulator bridge for exercising the drive executable without the simulator.
//!
//! Sends grey camera frames at a fixed rate and integrates the returned throttle into a crude speed
//! model so the speed regulator has something to act on.

use std::{thread, time::Duration};

use comms_if::{
    net::{MonitoredSocket, SocketOptions},
    sim::{SimInbound, SimOutbound, TelemetryFrame},
};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "test_sim_bridge")]
struct Opts {
    /// Endpoint the drive executable is bound to
    #[structopt(long, default_value = "tcp://localhost:4567")]
    endpoint: String,

    /// Telemetry rate
    #[structopt(long, default_value = "10")]
    rate_hz: f64,

    /// Number of frames to send before exiting
    #[structopt(long, default_value = "600")]
    frames: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        recv_timeout: 50,
        send_timeout: 50,
        linger: 1,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(&ctx, zmq::PAIR, socket_options, &opts.endpoint)?;

    println!("Connected to {}", opts.endpoint);

    // Encode one frame up front, the content never changes
    let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 160, Rgb([128, 128, 128])));
    let mut data = Vec::new();
    frame.write_to(&mut data, ImageOutputFormat::Jpeg(75))?;
    let image = base64::encode(&data);

    let connect = SimInbound::Connect {
        sid: Some("test_sim_bridge".into()),
    };
    socket.send(serde_json::to_string(&connect)?.as_str(), 0)?;

    let period = Duration::from_secs_f64(1.0 / opts.rate_hz);
    let mut speed = 0f64;
    let mut steering = 0f64;
    let mut throttle = 0f64;

    for i in 0..opts.frames {
        let msg = SimInbound::Telemetry(TelemetryFrame {
            steering_angle: steering.to_string(),
            throttle: throttle.to_string(),
            speed: speed.to_string(),
            image: image.clone(),
        });
        socket.send(serde_json::to_string(&msg)?.as_str(), 0)?;

        // Drain any replies
        while let Ok(Ok(s)) = socket.recv_string(0) {
            match serde_json::from_str::<SimOutbound>(&s) {
                Ok(SimOutbound::Steer(f)) => {
                    steering = f.steering_angle.parse().unwrap_or(0.0);
                    throttle = f.throttle.parse().unwrap_or(0.0);
                }
                Err(e) => println!("Bad reply \"{}\": {}", s, e),
            }
        }

        speed = (speed + throttle * 0.5).max(0.0);

        if i % 10 == 0 {
            println!(
                "frame {:4}: speed {:6.2}, steering {:+.4}, throttle {:+.3}",
                i, speed, steering, throttle
            );
        }

        thread::sleep(period);
    }

    socket.send(serde_json::to_string(&SimInbound::Disconnect)?.as_str(), 0)?;

    Ok(())
}
