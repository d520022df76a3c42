//! Linear steering model
//!
//! Predicts `w . x + b` where `x` is the preprocessed image scaled into `[-0.5, 0.5]`. Training is
//! one gradient descent step on the mean squared error per batch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

// Internal
use super::{ModelError, OnlineTrainer, SteeringPredictor};
use crate::preprocess::Features;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Linear model over the flattened feature tensor.
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Weights,

    learning_rate: f32,

    checkpoint_path: PathBuf,
}

/// Checkpoint contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Weights {
    w: Array1<f32>,
    b: f32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LinearModel {
    /// Create a zero initialised model over `feature_len` features.
    pub fn zeros<P: AsRef<Path>>(feature_len: usize, learning_rate: f64, checkpoint_path: P) -> Self {
        Self {
            weights: Weights {
                w: Array1::zeros(feature_len),
                b: 0.0,
            },
            learning_rate: learning_rate as f32,
            checkpoint_path: checkpoint_path.as_ref().to_path_buf(),
        }
    }

    /// Load the weights from `weights_path`, falling back on zeros if the file doesn't exist.
    pub fn load_or_zeros<P: AsRef<Path>, Q: AsRef<Path>>(
        weights_path: Option<P>,
        feature_len: usize,
        learning_rate: f64,
        checkpoint_path: Q,
    ) -> Result<Self, ModelError> {
        let mut model = Self::zeros(feature_len, learning_rate, checkpoint_path);

        let path = match weights_path {
            Some(ref p) if p.as_ref().exists() => p.as_ref(),
            Some(ref p) => {
                info!(
                    "No weights found at {:?}, starting from a zero model",
                    p.as_ref()
                );
                return Ok(model);
            }
            None => {
                info!("No weights path given, starting from a zero model");
                return Ok(model);
            }
        };

        let file = File::open(path).map_err(ModelError::CheckpointIo)?;
        let weights: Weights =
            serde_json::from_reader(BufReader::new(file)).map_err(ModelError::CheckpointFormat)?;

        if weights.w.len() != feature_len {
            return Err(ModelError::FeatureLenMismatch {
                expected: feature_len,
                found: weights.w.len(),
            });
        }

        info!("Loaded model weights from {:?}", path);
        model.weights = weights;

        Ok(model)
    }

    pub fn feature_len(&self) -> usize {
        self.weights.w.len()
    }

    /// Flatten and scale the features into the model's input space.
    fn input(&self, features: &Features) -> Result<Array1<f32>, ModelError> {
        if features.len() != self.feature_len() {
            return Err(ModelError::FeatureLenMismatch {
                expected: self.feature_len(),
                found: features.len(),
            });
        }

        Ok(features.iter().map(|v| v / 255.0 - 0.5).collect())
    }
}

impl SteeringPredictor for LinearModel {
    fn predict(&self, features: &Features) -> Result<f64, ModelError> {
        let x = self.input(features)?;
        let y = x.dot(&self.weights.w) + self.weights.b;

        if y.is_finite() {
            Ok(y as f64)
        } else {
            Err(ModelError::NonFinite)
        }
    }
}

impl OnlineTrainer for LinearModel {
    fn train_step(&mut self, features: &[Features], labels: &[f64]) -> Result<f64, ModelError> {
        if features.len() != labels.len() {
            return Err(ModelError::LabelCountMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        if features.is_empty() {
            return Err(ModelError::EmptyBatch);
        }

        let n = features.len();
        let d = self.feature_len();

        let mut flat = Vec::with_capacity(n * d);
        for f in features {
            flat.extend(self.input(f)?.iter());
        }
        let x = Array2::from_shape_vec((n, d), flat).map_err(ModelError::ShapeError)?;
        let y: Array1<f32> = labels.iter().map(|&l| l as f32).collect();

        let err = x.dot(&self.weights.w) + self.weights.b - &y;
        let loss = err.mapv(|e| e * e).sum() / n as f32;

        if !loss.is_finite() {
            return Err(ModelError::NonFinite);
        }

        // Gradient of the mean squared error
        let scale = 2.0 / n as f32;
        let grad_w = x.t().dot(&err) * scale;
        let grad_b = err.sum() * scale;

        self.weights.w.scaled_add(-self.learning_rate, &grad_w);
        self.weights.b -= self.learning_rate * grad_b;

        debug!("Linear model step on {} samples, loss {:.6}", n, loss);

        Ok(loss as f64)
    }

    fn save_checkpoint(&mut self) -> Result<(), ModelError> {
        if let Some(parent) = self.checkpoint_path.parent() {
            fs::create_dir_all(parent).map_err(ModelError::CheckpointIo)?;
        }

        let file = File::create(&self.checkpoint_path).map_err(ModelError::CheckpointIo)?;
        serde_json::to_writer(BufWriter::new(file), &self.weights)
            .map_err(ModelError::CheckpointFormat)?;

        debug!("Checkpoint written to {:?}", self.checkpoint_path);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::Array3;

    fn white() -> Features {
        Array3::from_elem((1, 2, 3), 255.0)
    }

    #[test]
    fn test_train_step_reduces_loss() {
        let mut model = LinearModel::zeros(6, 0.1, "unused.json");

        assert_eq!(model.predict(&white()).unwrap(), 0.0);

        let loss_0 = model.train_step(&[white()], &[1.0]).unwrap();
        let loss_1 = model.train_step(&[white()], &[1.0]).unwrap();

        assert!((loss_0 - 1.0).abs() < 1e-6);
        assert!((loss_1 - 0.25).abs() < 1e-6);
        assert!((model.predict(&white()).unwrap() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_bad_inputs() {
        let mut model = LinearModel::zeros(6, 0.1, "unused.json");

        assert!(matches!(
            model.predict(&Array3::zeros((1, 1, 3))),
            Err(ModelError::FeatureLenMismatch {
                expected: 6,
                found: 3
            })
        ));
        assert!(matches!(
            model.train_step(&[white()], &[]),
            Err(ModelError::LabelCountMismatch { .. })
        ));
        assert!(matches!(
            model.train_step(&[], &[]),
            Err(ModelError::EmptyBatch)
        ));
    }

    #[test]
    fn test_checkpoint_reload() {
        let dir = std::env::temp_dir().join(format!("drive_lib_model_{}", std::process::id()));
        let path = dir.join("checkpoint.json");

        let mut model = LinearModel::zeros(6, 0.1, &path);
        model.train_step(&[white()], &[1.0]).unwrap();
        model.save_checkpoint().unwrap();

        let loaded = LinearModel::load_or_zeros(Some(&path), 6, 0.1, &path).unwrap();
        assert_eq!(
            loaded.predict(&white()).unwrap(),
            model.predict(&white()).unwrap()
        );

        assert!(matches!(
            LinearModel::load_or_zeros(Some(&path), 7, 0.1, &path),
            Err(ModelError::FeatureLenMismatch { .. })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }
}
