//! # UI event script interpreter module
//!
//! This module provides an interpreter for operator scripts, allowing a drive session to be run
//! without anyone at the console. A script is a list of timed entries:
//!
//! ```text
//! # Take over, speed up, and start recording
//! 1.0: toggle_mode;
//! 1.5: w w w w w;
//! 2.0: toggle_recording;
//! 30.0: quit;
//! ```
//!
//! Times are seconds since the start of the session, the payload is anything accepted by
//! [`UiEvent::parse_line`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;
use comms_if::ui::{UiEvent, UiEventParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An event which is scripted to occur at a specific time.
struct ScriptedEvent {
    /// The time the event is supposed to fire at
    exec_time_s: f64,

    event: UiEvent,
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending_events()` to
/// acquire the events which are due.
pub struct ScriptInterpreter {
    _script_path: PathBuf,

    events: VecDeque<ScriptedEvent>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the script interpreter.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script not found at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script contains no events")]
    ScriptEmpty,

    #[error("Invalid timestamp in script: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid event at {0} s: {1}")]
    InvalidEvent(f64, UiEventParseError),

    #[error("Entry at {0} s is earlier than the entry before it")]
    OutOfOrder(f64),
}

/// Events which need executing now.
#[derive(Debug, PartialEq)]
pub enum PendingEvents {
    None,
    Some(Vec<UiEvent>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Load the script at the given path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_script_str(&script)?;
        interp._script_path = path;

        Ok(interp)
    }

    /// Build an interpreter from the text of a script.
    pub fn from_script_str(script: &str) -> Result<Self, ScriptError> {
        let mut events: VecDeque<ScriptedEvent> = VecDeque::new();

        let re = match RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
        {
            Ok(r) => r,
            Err(e) => return Err(ScriptError::InvalidTimestamp(format!("{}", e))),
        };

        for cap in re.captures_iter(script) {
            let exec_time_s: f64 = cap[1]
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if let Some(last) = events.back() {
                if exec_time_s < last.exec_time_s {
                    return Err(ScriptError::OutOfOrder(exec_time_s));
                }
            }

            let parsed = UiEvent::parse_line(&cap[3])
                .map_err(|e| ScriptError::InvalidEvent(exec_time_s, e))?;

            events.extend(
                parsed
                    .into_iter()
                    .map(|event| ScriptedEvent { exec_time_s, event }),
            );
        }

        if events.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(ScriptInterpreter {
            _script_path: PathBuf::new(),
            events,
        })
    }

    /// Return the events due at the current session time.
    pub fn get_pending_events(&mut self) -> PendingEvents {
        self.get_pending_events_at(get_elapsed_seconds())
    }

    /// Return the events due at `current_time_s`, or `EndOfScript` once every event has been
    /// returned.
    pub fn get_pending_events_at(&mut self, current_time_s: f64) -> PendingEvents {
        if self.events.is_empty() {
            return PendingEvents::EndOfScript;
        }

        let mut due = vec![];

        while let Some(front) = self.events.front() {
            if front.exec_time_s > current_time_s {
                break;
            }
            if let Some(e) = self.events.pop_front() {
                due.push(e.event);
            }
        }

        if due.is_empty() {
            PendingEvents::None
        } else {
            PendingEvents::Some(due)
        }
    }

    /// Get the number of events in the script
    pub fn get_num_events(&self) -> usize {
        self.events.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.events.back() {
            Some(e) => e.exec_time_s,
            None => 0f64,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
