//! `skuvision-infra`
//!
//! **Responsibility:** adapters and orchestration around the ML boundary.
//!
//! - `store`: photo catalog, job rows and model catalog (Postgres + in-memory)
//! - `reporter`: durable job status checkpoints
//! - `export`: versioned on-disk artifacts
//! - `pipeline`: the job state machine driving all of the above

pub mod export;
pub mod pipeline;
pub mod reporter;
pub mod store;

pub use export::{ExportError, ExportMetadata, ExportedArtifact, ModelExporter, read_product_mapping};
pub use pipeline::{JobOutcome, PipelineConfig, PipelineError, TrainingPipeline, TrainingSummary, run_job};
pub use reporter::{JobStatusReporter, ReporterError};
pub use store::{InMemoryTrainingStore, PostgresTrainingStore, StoreError, TrainingStore};
