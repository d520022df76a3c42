//! Implementations for the ModeMgr state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::time::{Duration, Instant};

// Internal
use super::{transition, Mode, ModeError, ModeTrigger};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Mode manager.
///
/// Applies mode triggers and keeps track of how long the vehicle has driven itself since the
/// simulator last connected.
#[derive(Debug, Default)]
pub struct ModeMgr {
    mode: Mode,

    /// Time of the last simulator connection, `None` before the first one
    connect_time: Option<Instant>,

    /// Time of the last entry into or exit from autonomous mode
    last_switch_time: Option<Instant>,

    /// Autonomous time accumulated before `last_switch_time`
    auto_time: Duration,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModeMgr {
    /// Create a new manager in the `Stopped` mode.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Apply a trigger at time `now`.
    ///
    /// On failure the mode and timers are left untouched.
    pub fn request(&mut self, trigger: ModeTrigger, now: Instant) -> Result<Mode, ModeError> {
        let new_mode = match transition(self.mode, trigger) {
            Ok(m) => m,
            Err(e) => {
                warn!("Mode change rejected: {}", e);
                return Err(e);
            }
        };

        if new_mode != self.mode {
            info!("Mode change: {} -> {} ({})", self.mode, new_mode, trigger);
            self.update_timers(new_mode, now);
            self.mode = new_mode;
        }

        Ok(new_mode)
    }

    /// Reset the autonomy timers on a new simulator connection.
    pub fn on_connect(&mut self, now: Instant) {
        self.connect_time = Some(now);
        self.last_switch_time = Some(now);
        self.auto_time = Duration::from_secs(0);
    }

    /// Fraction of the time since the last connection spent in autonomous mode.
    ///
    /// Zero before the first connection.
    pub fn autonomy_rating(&self, now: Instant) -> f64 {
        let connect_time = match self.connect_time {
            Some(t) => t,
            None => return 0.0,
        };

        let total = now.saturating_duration_since(connect_time).as_secs_f64();
        if total <= 0.0 {
            return 0.0;
        }

        let mut auto = self.auto_time;
        if self.mode == Mode::Autonomous {
            if let Some(t) = self.last_switch_time {
                auto += now.saturating_duration_since(t);
            }
        }

        (auto.as_secs_f64() / total).min(1.0)
    }

    fn update_timers(&mut self, new_mode: Mode, now: Instant) {
        if self.mode == Mode::Autonomous {
            if let Some(t) = self.last_switch_time {
                self.auto_time += now.saturating_duration_since(t);
            }
        }

        if new_mode == Mode::Autonomous || self.mode == Mode::Autonomous {
            self.last_switch_time = Some(now);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
