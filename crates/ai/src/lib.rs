//! `skuvision-ai`
//!
//! **Responsibility:** turn product photos into a trained classifier.
//!
//! This crate is intentionally **not** aware of persistence:
//! - It never talks to the database or reports job status.
//! - It reads photo files from a storage root and returns samples, splits and
//!   fitted models.
//! - Training backends plug in through the [`Trainer`] trait.

pub mod dataset;
pub mod labels;
pub mod linear_probe;
pub mod loader;
pub mod remediation;
pub mod result;
pub mod split;
pub mod trainer;

pub use dataset::{
    AssembledDataset, DatasetAssembler, DatasetError, DatasetRequirements, MIN_CLASSES, MIN_TOTAL_PHOTOS,
    ProductClass, photo_path,
};
pub use labels::ClassIndex;
pub use linear_probe::{LinearProbeModel, LinearProbeTrainer};
pub use loader::{ImageLoader, ImageTensor, InputResolution, LoadError, LoadedSamples, Sample};
pub use remediation::{PreparedData, RemediationPolicy, prepare_training_data};
pub use result::{EpochReport, TrainError, TrainingOutcome};
pub use split::{SplitConfig, SplitError, TrainValSplit, stratified_split};
pub use trainer::{TrainedModel, Trainer, TrainerConfig};
