//! Durable job status checkpoints.
//!
//! Two write policies:
//! - progress updates are best-effort: failures are logged and swallowed;
//! - start and terminal transitions propagate their errors to the caller.
//!
//! Terminal transitions are computed on a copy of the snapshot and only adopted
//! once the store accepted them, so a rejected completion can still be followed
//! by a failure write.

use chrono::Utc;
use thiserror::Error;

use skuvision_core::{DomainError, JobId, ModelMetadata, PipelineStage, TrainingJob};

use crate::store::{StoreError, TrainingStore};

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] DomainError),
}

pub struct JobStatusReporter<'a> {
    store: &'a dyn TrainingStore,
    job: TrainingJob,
}

impl<'a> JobStatusReporter<'a> {
    pub fn new(store: &'a dyn TrainingStore, job_id: JobId) -> Self {
        Self {
            store,
            job: TrainingJob::pending(job_id, Utc::now()),
        }
    }

    /// Last snapshot accepted locally.
    pub fn job(&self) -> &TrainingJob {
        &self.job
    }

    /// Pending → InProgress with progress reset to 0.
    pub fn start(&mut self) -> Result<(), ReporterError> {
        let mut next = self.job.clone();
        next.start(Utc::now())?;
        self.store.save_job(&next)?;
        self.job = next;
        tracing::info!(job_id = %self.job.id, "training job started");
        Ok(())
    }

    /// Record a milestone. Never fails the caller.
    pub fn progress(&mut self, stage: &PipelineStage) {
        if let Err(e) = self.job.advance(stage, Utc::now()) {
            tracing::warn!(job_id = %self.job.id, error = %e, "progress update rejected");
            return;
        }

        match self.store.save_job(&self.job) {
            Ok(()) => tracing::info!(
                job_id = %self.job.id,
                progress = self.job.progress,
                stage = self.job.current_stage.as_deref().unwrap_or_default(),
                "progress"
            ),
            Err(e) => tracing::error!(
                job_id = %self.job.id,
                progress = self.job.progress,
                error = %e,
                "failed to persist progress"
            ),
        }
    }

    /// InProgress → Completed, activating `metadata` in the same store write.
    pub fn complete(&mut self, metadata: &ModelMetadata) -> Result<(), ReporterError> {
        let mut next = self.job.clone();
        next.complete(metadata.version.clone(), Utc::now())?;
        self.store.activate_model(metadata, &next)?;
        self.job = next;
        tracing::info!(
            job_id = %self.job.id,
            version = %metadata.version,
            duration_seconds = self.job.duration_seconds.unwrap_or_default(),
            "training job completed"
        );
        Ok(())
    }

    /// Any non-terminal state → Failed with `message` as the error text.
    pub fn fail(&mut self, message: &str) -> Result<(), ReporterError> {
        let mut next = self.job.clone();
        next.fail(message, Utc::now())?;
        self.store.save_job(&next)?;
        self.job = next;
        tracing::info!(job_id = %self.job.id, "training job marked failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTrainingStore;
    use skuvision_core::{AccuracyMetrics, JobStatus, ModelVersion};

    fn store_with_job() -> (InMemoryTrainingStore, JobId) {
        let store = InMemoryTrainingStore::new();
        let id = JobId::new();
        store.insert_job(TrainingJob::pending(id, Utc::now())).unwrap();
        (store, id)
    }

    fn metadata() -> ModelMetadata {
        ModelMetadata::activated(
            ModelVersion::generate(Utc::now()),
            Utc::now(),
            AccuracyMetrics::from_validation(0.75),
            12,
            3,
        )
    }

    #[test]
    fn start_on_missing_row_propagates() {
        let store = InMemoryTrainingStore::new();
        let mut reporter = JobStatusReporter::new(&store, JobId::new());

        let err = reporter.start().unwrap_err();
        assert!(matches!(err, ReporterError::Store(StoreError::JobNotFound(_))));
        assert_eq!(reporter.job().status, JobStatus::Pending);
    }

    #[test]
    fn progress_failures_are_swallowed() {
        let (store, id) = store_with_job();
        let mut reporter = JobStatusReporter::new(&store, id);
        reporter.start().unwrap();

        store.fail_progress_writes(true);
        reporter.progress(&PipelineStage::FetchingPhotos);

        assert_eq!(reporter.job().progress, 5);
        assert_eq!(store.job(id).unwrap().progress, 0);
    }

    #[test]
    fn backwards_progress_is_ignored() {
        let (store, id) = store_with_job();
        let mut reporter = JobStatusReporter::new(&store, id);
        reporter.start().unwrap();
        reporter.progress(&PipelineStage::LoadingImages);
        reporter.progress(&PipelineStage::FetchingPhotos);

        assert_eq!(reporter.job().progress, 20);
        assert_eq!(store.job_history(id).len(), 3);
    }

    #[test]
    fn rejected_completion_can_still_fail() {
        let (store, id) = store_with_job();
        let mut reporter = JobStatusReporter::new(&store, id);
        reporter.start().unwrap();

        store.fail_terminal_writes(true);
        assert!(reporter.complete(&metadata()).is_err());
        assert_eq!(reporter.job().status, JobStatus::InProgress);

        store.fail_terminal_writes(false);
        reporter.fail("activation failed").unwrap();
        let persisted = store.job(id).unwrap();
        assert_eq!(persisted.status, JobStatus::Failed);
        assert_eq!(persisted.error_message.as_deref(), Some("activation failed"));
        assert!(store.models().is_empty());
    }

    #[test]
    fn completion_persists_version_and_full_progress() {
        let (store, id) = store_with_job();
        let mut reporter = JobStatusReporter::new(&store, id);
        reporter.start().unwrap();
        let metadata = metadata();

        reporter.complete(&metadata).unwrap();

        let persisted = store.job(id).unwrap();
        assert_eq!(persisted.status, JobStatus::Completed);
        assert_eq!(persisted.progress, 100);
        assert_eq!(persisted.result_model_version, Some(metadata.version));
        assert!(persisted.duration_seconds.is_some());
    }
}
