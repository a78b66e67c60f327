//! End-to-end orchestration of one training job.
//!
//! Stages run strictly forward: fetch → assemble → load/split → train →
//! export → activate. Every stage boundary is reported as a progress
//! checkpoint; every fatal error funnels through [`TrainingPipeline::run`],
//! which makes one attempt to record the failure and maps the result to an
//! exit code.

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;

use skuvision_ai::{
    DatasetAssembler, DatasetError, DatasetRequirements, ImageLoader, RemediationPolicy, SplitConfig, TrainError,
    Trainer, prepare_training_data,
};
use skuvision_core::{AccuracyMetrics, JobId, ModelMetadata, ModelVersion, PipelineStage};

use crate::export::{DEFAULT_DESCRIPTION, ExportError, ModelExporter};
use crate::reporter::{JobStatusReporter, ReporterError};
use crate::store::{StoreError, TrainingStore};

/// Every fatal error a job can end with.
///
/// Variants are transparent: the text recorded as the job's error message is
/// exactly the underlying error's text.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Training(#[from] TrainError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Reporter(#[from] ReporterError),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root holding `products/<product-id>/<file>`.
    pub storage_root: PathBuf,
    /// Root under which version directories are created.
    pub output_root: PathBuf,
    pub requirements: DatasetRequirements,
    pub remediation: RemediationPolicy,
    pub split: SplitConfig,
    pub description: String,
}

impl PipelineConfig {
    pub fn new(storage_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            output_root: output_root.into(),
            requirements: DatasetRequirements::default(),
            remediation: RemediationPolicy::default(),
            split: SplitConfig::default(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }

    pub fn with_requirements(mut self, requirements: DatasetRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_remediation(mut self, remediation: RemediationPolicy) -> Self {
        self.remediation = remediation;
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// What a completed job produced.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub version: ModelVersion,
    pub artifact_dir: PathBuf,
    pub validation_accuracy: f64,
    pub photos_used: usize,
    pub products_used: usize,
    /// Remediation attempt that produced the split.
    pub remediation_attempts: u32,
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(TrainingSummary),
    Failed {
        error: String,
        /// Whether the Failed status reached the store.
        failure_recorded: bool,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

pub struct TrainingPipeline<'a> {
    store: &'a dyn TrainingStore,
    trainer: &'a dyn Trainer,
    config: PipelineConfig,
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(store: &'a dyn TrainingStore, trainer: &'a dyn Trainer, config: PipelineConfig) -> Self {
        Self { store, trainer, config }
    }

    /// Run the job and record its terminal status.
    pub fn run(&self, job_id: JobId) -> JobOutcome {
        let mut reporter = JobStatusReporter::new(self.store, job_id);

        let result = reporter
            .start()
            .map_err(PipelineError::from)
            .and_then(|()| self.execute(&mut reporter));

        match result {
            Ok(summary) => JobOutcome::Completed(summary),
            Err(e) => {
                let error = e.to_string();
                tracing::error!(job_id = %job_id, error = %error, "training job failed");

                let failure_recorded = match reporter.fail(&error) {
                    Ok(()) => true,
                    Err(write_err) => {
                        tracing::error!(
                            job_id = %job_id,
                            error = %write_err,
                            "failed to record job failure"
                        );
                        false
                    }
                };
                JobOutcome::Failed {
                    error,
                    failure_recorded,
                }
            }
        }
    }

    fn execute(&self, reporter: &mut JobStatusReporter<'_>) -> Result<TrainingSummary, PipelineError> {
        reporter.progress(&PipelineStage::FetchingPhotos);
        let records = self.store.fetch_photos()?;

        let assembler =
            DatasetAssembler::new(&self.config.storage_root).with_requirements(self.config.requirements);
        assembler.check_record_count(&records)?;

        reporter.progress(&PipelineStage::PreparingDataset {
            photos: records.len(),
        });
        let dataset = assembler.assemble(&records)?;

        reporter.progress(&PipelineStage::LoadingImages);
        let loader = ImageLoader::new(self.trainer.config().input_resolution);
        let prepared = prepare_training_data(&dataset, &loader, &self.config.split, &self.config.remediation)?;
        tracing::info!(
            train = prepared.split.train.len(),
            validation = prepared.split.validation.len(),
            attempts = prepared.attempts,
            threshold = prepared.threshold,
            skipped = prepared.skipped,
            "dataset ready"
        );

        reporter.progress(&PipelineStage::BuildingModel {
            architecture: self.trainer.architecture().to_string(),
        });
        reporter.progress(&PipelineStage::Training {
            epoch: 0,
            total_epochs: self.trainer.config().epochs,
            accuracy: None,
        });
        let outcome = self
            .trainer
            .train(&prepared.split, dataset.num_classes(), &mut |report| {
                reporter.progress(&PipelineStage::Training {
                    epoch: report.epoch,
                    total_epochs: report.total_epochs,
                    accuracy: Some(report.train_accuracy),
                });
            })?;

        reporter.progress(&PipelineStage::Exporting);
        let classes = dataset.class_index();
        let artifact = ModelExporter::new(&self.config.output_root)
            .with_description(self.config.description.clone())
            .export(outcome.model.as_ref(), &classes, outcome.validation_accuracy, Utc::now())?;

        reporter.progress(&PipelineStage::UpdatingMetadata);
        let metadata = ModelMetadata::activated(
            artifact.version.clone(),
            artifact.metadata.trained_at,
            AccuracyMetrics::from_validation(outcome.validation_accuracy),
            dataset.total_records(),
            dataset.num_classes(),
        );
        reporter.complete(&metadata)?;

        Ok(TrainingSummary {
            version: artifact.version,
            artifact_dir: artifact.directory,
            validation_accuracy: outcome.validation_accuracy,
            photos_used: dataset.total_records(),
            products_used: dataset.num_classes(),
            remediation_attempts: prepared.attempts,
        })
    }
}

/// Run one job end to end with the given collaborators.
pub fn run_job(
    store: &dyn TrainingStore,
    trainer: &dyn Trainer,
    config: PipelineConfig,
    job_id: JobId,
) -> JobOutcome {
    TrainingPipeline::new(store, trainer, config).run(job_id)
}
