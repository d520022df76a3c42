//! # Mode management module
//!
//! Owns the vehicle's operating mode. Transitions are defined by a pure table in [`transition`],
//! [`ModeMgr`] applies them and keeps the timers used for the autonomy rating.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::fmt;

// Internal
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Operating mode of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// All controller output suppressed, commands are zero.
    Stopped,

    /// Steering from the inference model.
    Autonomous,

    /// Steering from the operator.
    Manual,

    /// Steering from the operator, with every tick recorded for online training.
    Training,
}

/// A request to change mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeTrigger {
    EngageAutopilot,
    EmergencyStop,
    Override,
    StartTraining,
    StopTraining,
}

/// Errors that can occur during mode management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    #[error("Cannot {trigger} while in {from} mode")]
    InvalidTransition { from: Mode, trigger: ModeTrigger },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the mode reached by applying `trigger` in mode `from`.
///
/// | trigger | allowed from | to |
/// |---------|--------------|----|
/// | `EngageAutopilot` | any | `Autonomous` |
/// | `EmergencyStop` | any | `Stopped` |
/// | `Override` | `Autonomous`, `Stopped` | `Manual` |
/// | `StartTraining` | `Manual` | `Training` |
/// | `StopTraining` | `Training` | `Manual` |
pub fn transition(from: Mode, trigger: ModeTrigger) -> Result<Mode, ModeError> {
    use Mode::*;
    use ModeTrigger::*;

    match (from, trigger) {
        (_, EngageAutopilot) => Ok(Autonomous),
        (_, EmergencyStop) => Ok(Stopped),
        (Autonomous, Override) | (Stopped, Override) => Ok(Manual),
        (Manual, StartTraining) => Ok(Training),
        (Training, StopTraining) => Ok(Manual),
        (from, trigger) => Err(ModeError::InvalidTransition { from, trigger }),
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Mode {
    fn default() -> Self {
        Mode::Stopped
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Stopped => "Stopped",
            Mode::Autonomous => "Autonomous",
            Mode::Manual => "Manual",
            Mode::Training => "Training",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ModeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModeTrigger::EngageAutopilot => "engage autopilot",
            ModeTrigger::EmergencyStop => "emergency stop",
            ModeTrigger::Override => "override",
            ModeTrigger::StartTraining => "start training",
            ModeTrigger::StopTraining => "stop training",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const ALL_MODES: [Mode; 4] = [
        Mode::Stopped,
        Mode::Autonomous,
        Mode::Manual,
        Mode::Training,
    ];

    #[test]
    fn test_universal_triggers() {
        for &m in ALL_MODES.iter() {
            assert_eq!(transition(m, ModeTrigger::EmergencyStop), Ok(Mode::Stopped));
            assert_eq!(
                transition(m, ModeTrigger::EngageAutopilot),
                Ok(Mode::Autonomous)
            );
        }
    }

    #[test]
    fn test_training_guards() {
        assert_eq!(
            transition(Mode::Stopped, ModeTrigger::StartTraining),
            Err(ModeError::InvalidTransition {
                from: Mode::Stopped,
                trigger: ModeTrigger::StartTraining
            })
        );
        assert!(transition(Mode::Autonomous, ModeTrigger::StartTraining).is_err());
        assert!(transition(Mode::Training, ModeTrigger::StartTraining).is_err());
        assert_eq!(
            transition(Mode::Manual, ModeTrigger::StartTraining),
            Ok(Mode::Training)
        );

        assert_eq!(
            transition(Mode::Training, ModeTrigger::StopTraining),
            Ok(Mode::Manual)
        );
        for &m in [Mode::Stopped, Mode::Autonomous, Mode::Manual].iter() {
            assert!(transition(m, ModeTrigger::StopTraining).is_err());
        }
    }

    #[test]
    fn test_override() {
        assert_eq!(
            transition(Mode::Autonomous, ModeTrigger::Override),
            Ok(Mode::Manual)
        );
        assert_eq!(
            transition(Mode::Stopped, ModeTrigger::Override),
            Ok(Mode::Manual)
        );
        assert!(transition(Mode::Manual, ModeTrigger::Override).is_err());
        assert!(transition(Mode::Training, ModeTrigger::Override).is_err());
    }
}
