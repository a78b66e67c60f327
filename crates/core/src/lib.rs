//! `skuvision-core`: domain building blocks for the product photo trainer.
//!
//! This crate contains **pure domain** types (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod job;
pub mod model;
pub mod photo;
pub mod stage;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, ModelMetadataId, PhotoId, ProductId};
pub use job::{JobStatus, TrainingJob};
pub use model::{AccuracyMetrics, ModelMetadata, ModelVersion};
pub use photo::PhotoRecord;
pub use stage::{PipelineStage, epoch_progress};
