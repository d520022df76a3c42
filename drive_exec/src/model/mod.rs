//! # Model module
//!
//! Interfaces to the steering model used for inference and online training, and a linear model
//! implementing them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod linear;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use linear::*;
pub use params::*;

use crate::preprocess::Features;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Predicts a steering angle from preprocessed camera features.
pub trait SteeringPredictor {
    /// Predict the normalised steering angle for `features`.
    fn predict(&self, features: &Features) -> Result<f64, ModelError>;
}

/// Updates a model from batches of labelled samples while driving.
pub trait OnlineTrainer {
    /// Perform one synchronous training step, returning the batch loss.
    ///
    /// `features` and `labels` are the same length and in recording order.
    fn train_step(&mut self, features: &[Features], labels: &[f64]) -> Result<f64, ModelError>;

    /// Persist the current weights.
    fn save_checkpoint(&mut self) -> Result<(), ModelError>;
}

/// A model which can both drive and learn.
pub trait DriveModel: SteeringPredictor + OnlineTrainer {}

impl<T> DriveModel for T where T: SteeringPredictor + OnlineTrainer {}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Expected {expected} features but got {found}")]
    FeatureLenMismatch { expected: usize, found: usize },

    #[error("Got {features} feature sets but {labels} labels")]
    LabelCountMismatch { features: usize, labels: usize },

    #[error("Cannot train on an empty batch")]
    EmptyBatch,

    #[error("Model produced a non-finite value")]
    NonFinite,

    #[error("Could not build the training matrix: {0}")]
    ShapeError(ndarray::ShapeError),

    #[error("Could not access the checkpoint file: {0}")]
    CheckpointIo(std::io::Error),

    #[error("Could not (de)serialise the checkpoint: {0}")]
    CheckpointFormat(serde_json::Error),

    #[error("Model failure: {0}")]
    Other(String),
}
