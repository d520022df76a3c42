//! # Simulator Interface
//!
//! Messages exchanged between the drive executable and the simulator bridge. The bridge relays the
//! simulator's telemetry as JSON and forwards the steering commands it gets back.
//!
//! Numeric values travel as strings, which is what the simulator produces and expects. Plain JSON
//! numbers are accepted on input as well.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::RgbImage;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A telemetry frame as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Current steering angle of the car, normalised to the maximum steering angle.
    #[serde(deserialize_with = "str_or_num")]
    pub steering_angle: String,

    /// Current throttle of the car.
    #[serde(deserialize_with = "str_or_num")]
    pub throttle: String,

    /// Current speed of the car.
    ///
    /// Units: miles/hour
    #[serde(deserialize_with = "str_or_num")]
    pub speed: String,

    /// Base64 encoded image from the centre camera (JPEG or PNG).
    pub image: String,
}

/// A decoded telemetry event.
#[derive(Debug, Clone)]
pub struct Telemetry {
    /// Current steering angle reported by the car, normalised.
    pub steering_angle: f64,

    /// Current throttle reported by the car.
    pub throttle: f64,

    /// Measured speed of the car.
    ///
    /// Units: miles/hour
    pub speed: f64,

    /// Centre camera image.
    pub image: RgbImage,
}

/// A control command to be sent to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlCmd {
    /// Steering angle demand, normalised to the maximum steering angle.
    pub steering_angle: f64,

    /// Throttle demand between -1 and +1.
    pub throttle: f64,
}

/// Wire form of a control command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteerFrame {
    pub steering_angle: String,
    pub throttle: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Messages sent from the bridge to the drive executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SimInbound {
    /// New telemetry from the car.
    Telemetry(TelemetryFrame),

    /// The simulator has connected to the bridge.
    Connect {
        #[serde(default)]
        sid: Option<String>,
    },

    /// The simulator has disconnected from the bridge.
    Disconnect,
}

/// Messages sent from the drive executable to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SimOutbound {
    /// Steering and throttle demand for the car.
    Steer(SteerFrame),
}

/// Errors which can occur while decoding simulator messages.
#[derive(Debug, Error)]
pub enum SimMsgParseError {
    #[error("Message contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Field {0} is not a number ({1:?})")]
    InvalidNumber(&'static str, String),

    #[error("Image is not valid base64: {0}")]
    InvalidBase64(base64::DecodeError),

    #[error("Image could not be decoded: {0}")]
    InvalidImage(image::ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimInbound {
    /// Parse an inbound message from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, SimMsgParseError> {
        serde_json::from_str(json_str).map_err(SimMsgParseError::InvalidJson)
    }
}

impl TelemetryFrame {
    /// Decode the frame, parsing the numeric fields and the camera image.
    pub fn decode(&self) -> Result<Telemetry, SimMsgParseError> {
        let steering_angle = parse_num("steering_angle", &self.steering_angle)?;
        let throttle = parse_num("throttle", &self.throttle)?;
        let speed = parse_num("speed", &self.speed)?;

        let bytes = base64::decode(self.image.trim()).map_err(SimMsgParseError::InvalidBase64)?;
        let image = image::load_from_memory(&bytes)
            .map_err(SimMsgParseError::InvalidImage)?
            .to_rgb8();

        Ok(Telemetry {
            steering_angle,
            throttle,
            speed,
            image,
        })
    }
}

impl ControlCmd {
    /// The neutral command, zero steering and zero throttle.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Build the outbound message carrying this command.
    pub fn to_outbound(&self) -> SimOutbound {
        SimOutbound::Steer(SteerFrame {
            steering_angle: self.steering_angle.to_string(),
            throttle: self.throttle.to_string(),
        })
    }
}

impl SimOutbound {
    /// Serialise the message to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a numeric field, `nan` and `inf` are rejected along with anything unparsable.
fn parse_num(field: &'static str, s: &str) -> Result<f64, SimMsgParseError> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SimMsgParseError::InvalidNumber(field, s.to_string())),
    }
}

/// Accept either a JSON string or a JSON number, keeping the textual form.
fn str_or_num<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(f64),
    }

    Ok(match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Str(s) => s,
        StrOrNum::Num(n) => n.to_string(),
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use image::{ImageOutputFormat, Rgb};

    fn encoded_png(w: u32, h: u32) -> String {
        let img = image::DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
        let mut data = Vec::new();
        img.write_to(&mut data, ImageOutputFormat::Png).unwrap();
        base64::encode(&data)
    }

    #[test]
    fn test_parse_telemetry() {
        let json = format!(
            r#"{{"event":"telemetry","data":{{"steering_angle":"0.25","throttle":"0.1",
            "speed":12.5,"image":"{}"}}}}"#,
            encoded_png(4, 3)
        );

        let tm = match SimInbound::from_json(&json).unwrap() {
            SimInbound::Telemetry(f) => f.decode().unwrap(),
            m => panic!("Expected telemetry, got {:?}", m),
        };

        assert_eq!(tm.steering_angle, 0.25);
        assert_eq!(tm.throttle, 0.1);
        assert_eq!(tm.speed, 12.5);
        assert_eq!(tm.image.dimensions(), (4, 3));
        assert_eq!(tm.image.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_parse_connect_events() {
        match SimInbound::from_json(r#"{"event":"connect","data":{"sid":"abc"}}"#).unwrap() {
            SimInbound::Connect { sid } => assert_eq!(sid.as_deref(), Some("abc")),
            m => panic!("Expected connect, got {:?}", m),
        }

        assert!(matches!(
            SimInbound::from_json(r#"{"event":"disconnect"}"#).unwrap(),
            SimInbound::Disconnect
        ));
    }

    #[test]
    fn test_bad_number_rejected() {
        let frame = TelemetryFrame {
            steering_angle: "0".into(),
            throttle: "0".into(),
            speed: "fast".into(),
            image: encoded_png(1, 1),
        };

        assert!(matches!(
            frame.decode(),
            Err(SimMsgParseError::InvalidNumber("speed", _))
        ));
    }

    #[test]
    fn test_non_finite_number_rejected() {
        for bad in ["nan", "NaN", "inf", "-inf"].iter() {
            let frame = TelemetryFrame {
                steering_angle: "0".into(),
                throttle: "0".into(),
                speed: bad.to_string(),
                image: encoded_png(1, 1),
            };

            assert!(matches!(
                frame.decode(),
                Err(SimMsgParseError::InvalidNumber("speed", _))
            ));
        }
    }

    #[test]
    fn test_steer_message_uses_strings() {
        let cmd = ControlCmd {
            steering_angle: -0.5,
            throttle: 1.0,
        };
        let json = cmd.to_outbound().to_json().unwrap();

        assert_eq!(
            json,
            r#"{"event":"steer","data":{"steering_angle":"-0.5","throttle":"1"}}"#
        );
    }
}
