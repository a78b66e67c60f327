use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trainer::TrainedModel;

/// Statistics reported at the end of every epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub total_epochs: usize,
    /// Mean cross-entropy over the epoch's training samples.
    pub train_loss: f64,
    /// Training accuracy in \[0, 1\].
    pub train_accuracy: f64,
}

/// What a successful training run hands back to the orchestrator.
pub struct TrainingOutcome {
    pub model: Box<dyn TrainedModel>,
    /// Validation accuracy in \[0, 1\].
    pub validation_accuracy: f64,
    pub history: Vec<EpochReport>,
}

impl core::fmt::Debug for TrainingOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TrainingOutcome")
            .field("architecture", &self.model.architecture())
            .field("validation_accuracy", &self.validation_accuracy)
            .field("epochs", &self.history.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid training input: {0}")]
    InvalidInput(String),

    #[error("training diverged: {0}")]
    Diverged(String),

    /// Failure surfaced by an external framework, message kept verbatim.
    #[error("{0}")]
    Framework(String),
}
