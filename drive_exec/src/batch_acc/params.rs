//! Parameters structure for the batch accumulator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Number of samples in one training batch.
    pub training_batch_size: usize,

    /// What to do when a training step fails.
    pub fail_policy: TrainFailPolicy,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Behaviour on a failed training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainFailPolicy {
    /// Drop the batch, log the error and carry on driving.
    Recover,

    /// Keep the batch and stop.
    Fatal,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            training_batch_size: 16,
            fail_policy: TrainFailPolicy::default(),
        }
    }
}

impl Default for TrainFailPolicy {
    fn default() -> Self {
        TrainFailPolicy::Recover
    }
}
