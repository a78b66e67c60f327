use skuvision_core::{JobId, ModelMetadata, PhotoRecord, TrainingJob};

/// Store abstraction used by the training pipeline.
///
/// Methods are synchronous; async adapters drive their own runtime.
pub trait TrainingStore: Send + Sync {
    /// Photos of active products, ordered by product then display order.
    fn fetch_photos(&self) -> Result<Vec<PhotoRecord>, StoreError>;

    /// Overwrite the job row with the given snapshot.
    ///
    /// Returns `StoreError::JobNotFound` when no row has the job's id.
    fn save_job(&self, job: &TrainingJob) -> Result<(), StoreError>;

    /// Deactivate every active model, insert `metadata` as the active one and
    /// save the completed `job`, as one unit.
    fn activate_model(&self, metadata: &ModelMetadata, job: &TrainingJob) -> Result<(), StoreError>;

    /// Currently active model, if any.
    fn active_model(&self) -> Result<Option<ModelMetadata>, StoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("training job not found: {0}")]
    JobNotFound(JobId),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error in {operation}: {message}")]
    Database { operation: &'static str, message: String },

    #[error("invalid row in {operation}: {message}")]
    InvalidRow { operation: &'static str, message: String },

    #[error("storage error: {0}")]
    Storage(String),
}
