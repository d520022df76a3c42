//! Implementations for the BatchAccumulator state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info, warn};

// Internal
use super::{BatchError, Params, RecordOutcome, Sample, TrainFailPolicy, TrainReport};
use crate::mode_mgr::Mode;
use crate::model::OnlineTrainer;
use crate::preprocess::Features;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Accumulates samples into fixed size training batches.
///
/// The pending batch never holds more than `training_batch_size` samples.
#[derive(Debug)]
pub struct BatchAccumulator {
    params: Params,

    features: Vec<Features>,

    labels: Vec<f64>,

    batches_trained: usize,

    last_loss: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BatchAccumulator {
    pub fn new(params: Params) -> Self {
        let batch_size = params.training_batch_size.max(1);

        Self {
            params: Params {
                training_batch_size: batch_size,
                ..params
            },
            features: Vec::with_capacity(batch_size),
            labels: Vec::with_capacity(batch_size),
            batches_trained: 0,
            last_loss: None,
        }
    }

    /// Record a sample taken in `mode`.
    ///
    /// Samples are only kept in `Training` mode. Once the batch is full the trainer is run
    /// synchronously, the checkpoint is saved and the batch cleared.
    ///
    /// If a previous training step failed under the `Fatal` policy the batch is still full, in
    /// which case training is retried before the new sample is accepted.
    pub fn record<T: OnlineTrainer + ?Sized>(
        &mut self,
        mode: Mode,
        sample: Sample,
        trainer: &mut T,
    ) -> Result<RecordOutcome, BatchError> {
        if mode != Mode::Training {
            return Ok(RecordOutcome::Ignored);
        }

        // The sample that completes a retried batch starts the next one
        let retried = if self.is_full() {
            warn!("Retrying training on the pending batch");
            Some(self.train(trainer)?)
        } else {
            None
        };

        self.features.push(sample.features);
        self.labels.push(sample.label);

        match retried {
            Some(outcome) => Ok(outcome),
            None if self.is_full() => self.train(trainer),
            None => Ok(RecordOutcome::Pending { len: self.len() }),
        }
    }

    /// Number of samples in the pending batch.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.params.training_batch_size
    }

    pub fn batches_trained(&self) -> usize {
        self.batches_trained
    }

    pub fn last_loss(&self) -> Option<f64> {
        self.last_loss
    }

    fn is_full(&self) -> bool {
        self.len() >= self.params.training_batch_size
    }

    fn clear(&mut self) {
        self.features.clear();
        self.labels.clear();
    }

    fn train<T: OnlineTrainer + ?Sized>(
        &mut self,
        trainer: &mut T,
    ) -> Result<RecordOutcome, BatchError> {
        info!("Training on batch {} ({} samples)", self.batches_trained, self.len());

        let loss = match trainer.train_step(&self.features, &self.labels) {
            Ok(l) => l,
            Err(e) => match self.params.fail_policy {
                TrainFailPolicy::Recover => {
                    let len = self.len();
                    error!("Training step failed, dropping {} samples: {}", len, e);
                    self.clear();
                    return Ok(RecordOutcome::Dropped { len });
                }
                TrainFailPolicy::Fatal => {
                    error!("Training step failed: {}", e);
                    return Err(BatchError::TrainStepFailure(e));
                }
            },
        };

        let mut report = TrainReport {
            index: self.batches_trained,
            loss,
            labels: self.labels.clone(),
            checkpoint_saved: true,
        };

        self.batches_trained += 1;
        self.last_loss = Some(loss);
        self.clear();

        info!("Batch {} trained, loss: {:.6}", report.index, loss);

        // The weights have changed so the batch is consumed even if the save fails
        if let Err(e) = trainer.save_checkpoint() {
            match self.params.fail_policy {
                TrainFailPolicy::Recover => {
                    warn!("Could not save checkpoint: {}", e);
                    report.checkpoint_saved = false;
                }
                TrainFailPolicy::Fatal => {
                    error!("Could not save checkpoint: {}", e);
                    return Err(BatchError::CheckpointFailure(e));
                }
            }
        }

        Ok(RecordOutcome::Trained(report))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
