//! # Operator Interface Events
//!
//! Discrete events produced by the operator front-ends (console or script).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An event raised by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiEvent {
    TurnLeft,
    TurnRight,
    SpeedUp,
    SlowDown,
    ResetSteering,

    /// Switch between autopilot and manual override.
    ToggleMode,

    /// Switch online training on or off, only meaningful under manual override.
    ToggleRecording,

    EmergencyStop,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum UiEventParseError {
    #[error("\"{0}\" is not a recognised UI event")]
    Unknown(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl UiEvent {
    /// Map a single key to its event.
    ///
    /// | key | event |
    /// |-----|-------|
    /// | `a` | turn left |
    /// | `d` | turn right |
    /// | `w` | speed up |
    /// | `s` | slow down |
    /// | `c` | reset steering |
    /// | `x` | toggle mode |
    /// | `z` | toggle recording |
    /// | `e` | emergency stop |
    /// | `q` | quit |
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'a' => Some(UiEvent::TurnLeft),
            'd' => Some(UiEvent::TurnRight),
            'w' => Some(UiEvent::SpeedUp),
            's' => Some(UiEvent::SlowDown),
            'c' => Some(UiEvent::ResetSteering),
            'x' => Some(UiEvent::ToggleMode),
            'z' => Some(UiEvent::ToggleRecording),
            'e' => Some(UiEvent::EmergencyStop),
            'q' => Some(UiEvent::Quit),
            _ => None,
        }
    }

    /// Parse a line of operator input.
    ///
    /// Each whitespace separated word is either an event name (`turn_left`) or a run of keys
    /// (`aaw`), so one line may carry several events.
    pub fn parse_line(line: &str) -> Result<Vec<Self>, UiEventParseError> {
        let mut events = Vec::new();

        for word in line.split_whitespace() {
            if let Ok(e) = word.parse() {
                events.push(e);
                continue;
            }

            for key in word.chars() {
                match UiEvent::from_key(key) {
                    Some(e) => events.push(e),
                    None => return Err(UiEventParseError::Unknown(word.to_string())),
                }
            }
        }

        Ok(events)
    }
}

impl FromStr for UiEvent {
    type Err = UiEventParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turn_left" | "left" => Ok(UiEvent::TurnLeft),
            "turn_right" | "right" => Ok(UiEvent::TurnRight),
            "speed_up" | "up" => Ok(UiEvent::SpeedUp),
            "slow_down" | "down" => Ok(UiEvent::SlowDown),
            "reset_steering" | "reset" => Ok(UiEvent::ResetSteering),
            "toggle_mode" => Ok(UiEvent::ToggleMode),
            "toggle_recording" => Ok(UiEvent::ToggleRecording),
            "emergency_stop" | "stop" => Ok(UiEvent::EmergencyStop),
            "quit" => Ok(UiEvent::Quit),
            other => Err(UiEventParseError::Unknown(other.to_string())),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            UiEvent::parse_line("aa toggle_mode W").unwrap(),
            vec![
                UiEvent::TurnLeft,
                UiEvent::TurnLeft,
                UiEvent::ToggleMode,
                UiEvent::SpeedUp
            ]
        );

        assert_eq!(UiEvent::parse_line("   ").unwrap(), vec![]);

        assert_eq!(
            UiEvent::parse_line("ab"),
            Err(UiEventParseError::Unknown("ab".into()))
        );
    }
}
