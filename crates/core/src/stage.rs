//! Pipeline milestones and the progress value each one reports.

use serde::{Deserialize, Serialize};

/// Progress at which the training sub-range starts.
pub const TRAINING_PROGRESS_START: u8 = 30;

/// Width of the training sub-range (epochs map onto 30..=80).
pub const TRAINING_PROGRESS_SPAN: u8 = 50;

/// A milestone of the training pipeline.
///
/// Progress values are fixed per milestone and non-decreasing in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum PipelineStage {
    Initializing,
    FetchingPhotos,
    PreparingDataset { photos: usize },
    LoadingImages,
    BuildingModel { architecture: String },
    Training {
        epoch: usize,
        total_epochs: usize,
        accuracy: Option<f64>,
    },
    Exporting,
    UpdatingMetadata,
    Completed,
    Failed,
}

impl PipelineStage {
    /// Progress percentage reported for this milestone.
    pub fn progress(&self) -> u8 {
        match self {
            PipelineStage::Initializing => 0,
            PipelineStage::FetchingPhotos => 5,
            PipelineStage::PreparingDataset { .. } => 10,
            PipelineStage::LoadingImages => 20,
            PipelineStage::BuildingModel { .. } => 25,
            PipelineStage::Training {
                epoch,
                total_epochs,
                ..
            } => epoch_progress(*epoch, *total_epochs),
            PipelineStage::Exporting => 85,
            PipelineStage::UpdatingMetadata => 95,
            PipelineStage::Completed => 100,
            PipelineStage::Failed => 0,
        }
    }

    /// Human-readable stage text stored on the job row.
    pub fn description(&self) -> String {
        match self {
            PipelineStage::Initializing => "Initializing training".to_string(),
            PipelineStage::FetchingPhotos => "Fetching product photos from database".to_string(),
            PipelineStage::PreparingDataset { photos } => {
                format!("Preparing dataset with {photos} photos")
            }
            PipelineStage::LoadingImages => "Loading and augmenting images".to_string(),
            PipelineStage::BuildingModel { architecture } => {
                format!("Building {architecture} model architecture")
            }
            PipelineStage::Training {
                epoch,
                total_epochs,
                accuracy,
            } => match accuracy {
                Some(acc) => format!(
                    "Training epoch {epoch}/{total_epochs} - Accuracy: {:.2}%",
                    acc * 100.0
                ),
                None => format!("Training model ({epoch}/{total_epochs} epochs)"),
            },
            PipelineStage::Exporting => "Exporting model artifacts".to_string(),
            PipelineStage::UpdatingMetadata => "Updating model metadata in database".to_string(),
            PipelineStage::Completed => "Training completed successfully".to_string(),
            PipelineStage::Failed => "Training failed".to_string(),
        }
    }
}

/// Map epoch `k` of `n` onto `30 + floor(k/n * 50)`.
///
/// `k` is clamped to `n`; `n == 0` reports the start of the range.
pub fn epoch_progress(epoch: usize, total_epochs: usize) -> u8 {
    if total_epochs == 0 {
        return TRAINING_PROGRESS_START;
    }
    let epoch = epoch.min(total_epochs);
    let offset = epoch * TRAINING_PROGRESS_SPAN as usize / total_epochs;
    TRAINING_PROGRESS_START + offset as u8
}
