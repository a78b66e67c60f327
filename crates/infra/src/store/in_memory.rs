use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use skuvision_core::{JobId, JobStatus, ModelMetadata, PhotoRecord, TrainingJob};

use super::r#trait::{StoreError, TrainingStore};

/// Write failures to simulate, for exercising the error policies.
#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    fetch: bool,
    progress: bool,
    terminal: bool,
}

/// In-memory store.
///
/// Intended for tests/dev. Every saved job snapshot is kept so callers can
/// inspect the full sequence of writes.
#[derive(Debug, Default)]
pub struct InMemoryTrainingStore {
    photos: RwLock<Vec<PhotoRecord>>,
    jobs: RwLock<HashMap<JobId, Vec<TrainingJob>>>,
    models: RwLock<Vec<ModelMetadata>>,
    faults: RwLock<Faults>,
}

impl InMemoryTrainingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_photos(photos: Vec<PhotoRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut slot) = store.photos.write() {
            *slot = photos;
        }
        store
    }

    /// Register a job row, as the backend does before launching the process.
    pub fn insert_job(&self, job: TrainingJob) -> Result<(), StoreError> {
        write(&self.jobs)?.insert(job.id, vec![job]);
        Ok(())
    }

    /// Pre-existing catalog row.
    pub fn insert_model(&self, metadata: ModelMetadata) -> Result<(), StoreError> {
        write(&self.models)?.push(metadata);
        Ok(())
    }

    /// Latest snapshot of a job.
    pub fn job(&self, job_id: JobId) -> Option<TrainingJob> {
        read(&self.jobs)
            .ok()?
            .get(&job_id)
            .and_then(|history| history.last().cloned())
    }

    /// Every snapshot written for a job, oldest first.
    pub fn job_history(&self, job_id: JobId) -> Vec<TrainingJob> {
        read(&self.jobs)
            .ok()
            .and_then(|jobs| jobs.get(&job_id).cloned())
            .unwrap_or_default()
    }

    /// All catalog rows in insertion order.
    pub fn models(&self) -> Vec<ModelMetadata> {
        read(&self.models).map(|m| m.clone()).unwrap_or_default()
    }

    pub fn fail_photo_fetch(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.write() {
            faults.fetch = fail;
        }
    }

    /// Reject progress writes of a job that is already running.
    pub fn fail_progress_writes(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.write() {
            faults.progress = fail;
        }
    }

    /// Reject terminal writes, model activation included.
    pub fn fail_terminal_writes(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.write() {
            faults.terminal = fail;
        }
    }

    fn faults(&self) -> Result<Faults, StoreError> {
        Ok(*read(&self.faults)?)
    }
}

impl TrainingStore for InMemoryTrainingStore {
    fn fetch_photos(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        if self.faults()?.fetch {
            return Err(StoreError::Connection("simulated fetch failure".to_string()));
        }
        Ok(read(&self.photos)?.clone())
    }

    fn save_job(&self, job: &TrainingJob) -> Result<(), StoreError> {
        let faults = self.faults()?;
        let mut jobs = write(&self.jobs)?;
        let history = jobs.get_mut(&job.id).ok_or(StoreError::JobNotFound(job.id))?;

        let already_running = history
            .last()
            .is_some_and(|previous| previous.status == JobStatus::InProgress);
        let simulated = if job.status.is_terminal() {
            faults.terminal
        } else {
            faults.progress && already_running
        };
        if simulated {
            return Err(StoreError::Database {
                operation: "save_job",
                message: format!("simulated write failure for {} job", job.status),
            });
        }

        history.push(job.clone());
        Ok(())
    }

    fn activate_model(&self, metadata: &ModelMetadata, job: &TrainingJob) -> Result<(), StoreError> {
        if self.faults()?.terminal {
            return Err(StoreError::Database {
                operation: "activate_model",
                message: "simulated write failure".to_string(),
            });
        }
        if job.status != JobStatus::Completed {
            return Err(StoreError::Storage(format!(
                "activating a model requires a completed job, got {}",
                job.status
            )));
        }

        // Both locks are held so readers never observe a half-applied activation.
        let mut jobs = write(&self.jobs)?;
        let mut models = write(&self.models)?;

        let history = jobs.get_mut(&job.id).ok_or(StoreError::JobNotFound(job.id))?;
        for model in models.iter_mut().filter(|m| m.is_active) {
            model.is_active = false;
            model.updated_at = metadata.created_at;
        }
        let mut inserted = metadata.clone();
        inserted.is_active = true;
        models.push(inserted);
        history.push(job.clone());
        Ok(())
    }

    fn active_model(&self) -> Result<Option<ModelMetadata>, StoreError> {
        Ok(read(&self.models)?.iter().rev().find(|m| m.is_active).cloned())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Storage("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Storage("in-memory store lock poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skuvision_core::{AccuracyMetrics, ModelVersion, PipelineStage};

    fn running_job(store: &InMemoryTrainingStore) -> TrainingJob {
        let mut job = TrainingJob::pending(JobId::new(), Utc::now());
        store.insert_job(job.clone()).unwrap();
        job.start(Utc::now()).unwrap();
        job
    }

    fn metadata(version: &str) -> ModelMetadata {
        ModelMetadata::activated(
            ModelVersion::from_string(version),
            Utc::now(),
            AccuracyMetrics::from_validation(0.5),
            10,
            2,
        )
    }

    #[test]
    fn unknown_job_is_not_found() {
        let store = InMemoryTrainingStore::new();
        let job = TrainingJob::pending(JobId::new(), Utc::now());

        let err = store.save_job(&job).unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(id) if id == job.id));
    }

    #[test]
    fn snapshots_are_recorded_in_order() {
        let store = InMemoryTrainingStore::new();
        let mut job = running_job(&store);
        store.save_job(&job).unwrap();
        job.advance(&PipelineStage::FetchingPhotos, Utc::now()).unwrap();
        store.save_job(&job).unwrap();

        let progress: Vec<u8> = store.job_history(job.id).iter().map(|j| j.progress).collect();
        assert_eq!(progress, vec![0, 0, 5]);
    }

    #[test]
    fn activation_leaves_exactly_one_active_row() {
        let store = InMemoryTrainingStore::new();
        store.insert_model(metadata("v1_20260101")).unwrap();

        let mut job = running_job(&store);
        let version = ModelVersion::from_string("v2_20260102");
        job.complete(version.clone(), Utc::now()).unwrap();
        store.activate_model(&metadata(version.as_str()), &job).unwrap();

        let models = store.models();
        assert_eq!(models.iter().filter(|m| m.is_active).count(), 1);
        assert_eq!(store.active_model().unwrap().unwrap().version, version);
        assert_eq!(store.job(job.id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn failed_activation_changes_nothing() {
        let store = InMemoryTrainingStore::new();
        store.insert_model(metadata("v1_20260101")).unwrap();
        let mut job = running_job(&store);
        job.complete(ModelVersion::from_string("v2_20260102"), Utc::now()).unwrap();

        store.fail_terminal_writes(true);
        assert!(store.activate_model(&metadata("v2_20260102"), &job).is_err());

        assert_eq!(store.models().len(), 1);
        assert!(store.models()[0].is_active);
        assert_eq!(store.job(job.id).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn progress_faults_do_not_block_terminal_writes() {
        let store = InMemoryTrainingStore::new();
        let mut job = running_job(&store);
        store.save_job(&job).unwrap();
        store.fail_progress_writes(true);
        job.advance(&PipelineStage::FetchingPhotos, Utc::now()).unwrap();
        assert!(store.save_job(&job).is_err());

        job.fail("boom", Utc::now()).unwrap();
        store.save_job(&job).unwrap();
        assert_eq!(store.job(job.id).unwrap().status, JobStatus::Failed);
    }
}
