//! # Training batch accumulator module
//!
//! Collects labelled samples while the operator drives in training mode, and hands each full
//! batch to the online trainer.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use params::*;
pub use state::*;

use crate::model::ModelError;
use crate::preprocess::Features;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One labelled training sample.
#[derive(Debug, Clone)]
pub struct Sample {
    pub features: Features,

    /// Steering the operator was applying when the image was taken.
    pub label: f64,
}

/// Summary of one completed training step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainReport {
    /// Index of the batch, counting from zero since start
    pub index: usize,

    pub loss: f64,

    pub labels: Vec<f64>,

    /// False if the checkpoint could not be written.
    pub checkpoint_saved: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Result of recording a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Not in training mode, sample discarded.
    Ignored,

    /// Sample added, batch not yet full.
    Pending { len: usize },

    /// Batch filled and trained on.
    Trained(TrainReport),

    /// Training failed and the batch was thrown away.
    Dropped { len: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Training step failed: {0}")]
    TrainStepFailure(ModelError),

    #[error("Could not save the checkpoint: {0}")]
    CheckpointFailure(ModelError),
}
