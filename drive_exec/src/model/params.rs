//! Parameters structure for the steering model

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the steering model.
///
/// Relative paths are resolved against the software root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Weights loaded at start, if the file exists.
    pub weights_path: Option<PathBuf>,

    /// File the weights are written to after every training step.
    pub checkpoint_path: PathBuf,

    /// Step size of the online training.
    pub learning_rate: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            weights_path: Some(PathBuf::from("models/checkpoint.json")),
            checkpoint_path: PathBuf::from("models/checkpoint.json"),
            learning_rate: 1e-5,
        }
    }
}
