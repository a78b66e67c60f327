use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::loader::InputResolution;
use crate::result::{EpochReport, TrainError, TrainingOutcome};
use crate::split::TrainValSplit;

/// Knobs the orchestrator supplies to any trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub input_resolution: InputResolution,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
    /// Randomly mirror training samples horizontally.
    pub augment_flip: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            input_resolution: InputResolution::default(),
            batch_size: 32,
            epochs: 15,
            learning_rate: 0.05,
            seed: 42,
            augment_flip: true,
        }
    }
}

impl TrainerConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_input_resolution(mut self, resolution: InputResolution) -> Self {
        self.input_resolution = resolution;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A classifier training backend.
///
/// The orchestrator owns progress reporting: implementations call `on_epoch`
/// once per finished epoch and must not persist anything themselves.
pub trait Trainer {
    /// Architecture name recorded in artifact metadata.
    fn architecture(&self) -> &str;

    fn config(&self) -> &TrainerConfig;

    /// Fit a classifier over `num_classes` classes (labels `0..num_classes`).
    fn train(
        &self,
        data: &TrainValSplit,
        num_classes: usize,
        on_epoch: &mut dyn FnMut(&EpochReport),
    ) -> Result<TrainingOutcome, TrainError>;
}

/// A fitted model that knows how to serialize itself.
pub trait TrainedModel: Send {
    fn architecture(&self) -> &str;

    fn input_resolution(&self) -> InputResolution;

    fn num_classes(&self) -> usize;

    /// Write the deployable representation into `dir`, returning the files
    /// written. `dir` already exists.
    fn write_artifacts(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>>;
}
