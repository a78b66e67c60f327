//! Training job lifecycle.
//!
//! `Pending → InProgress → {Completed, Failed}`. Transitions are applied to the
//! in-process snapshot first; persisting the snapshot is the reporter's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;
use crate::model::ModelVersion;
use crate::stage::PipelineStage;

/// Column limit for the stage text on the job row.
pub const MAX_STAGE_LEN: usize = 500;

/// Column limit for the error message on the job row.
pub const MAX_ERROR_LEN: usize = 2000;

/// Training job status as persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::InProgress => "InProgress",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one training job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub id: JobId,
    pub status: JobStatus,
    /// 0..=100
    pub progress: u8,
    pub current_stage: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
    pub result_model_version: Option<ModelVersion>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingJob {
    /// A job as the backend creates it, before this process touches it.
    pub fn pending(id: JobId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            current_stage: None,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
            error_message: None,
            result_model_version: None,
            updated_at: now,
        }
    }

    /// Pending → InProgress. Resets progress to 0 and records the start time.
    pub fn start(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::Pending {
            return Err(self.illegal(JobStatus::InProgress));
        }
        self.status = JobStatus::InProgress;
        self.progress = 0;
        self.started_at = Some(now);
        self.completed_at = None;
        self.duration_seconds = None;
        self.error_message = None;
        self.set_stage(&PipelineStage::Initializing);
        self.updated_at = now;
        Ok(())
    }

    /// Record a milestone while InProgress.
    ///
    /// Progress never moves backwards; a lower value is rejected and leaves the
    /// snapshot untouched.
    pub fn advance(&mut self, stage: &PipelineStage, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::InProgress {
            return Err(self.illegal(JobStatus::InProgress));
        }
        let progress = stage.progress().min(100);
        if progress < self.progress {
            return Err(DomainError::invariant(format!(
                "progress must not decrease ({} -> {})",
                self.progress, progress
            )));
        }
        self.progress = progress;
        self.set_stage(stage);
        self.updated_at = now;
        Ok(())
    }

    /// InProgress → Completed.
    pub fn complete(&mut self, version: ModelVersion, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::InProgress {
            return Err(self.illegal(JobStatus::Completed));
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.set_stage(&PipelineStage::Completed);
        self.result_model_version = Some(version);
        self.finish(now);
        Ok(())
    }

    /// Pending/InProgress → Failed. Progress drops to 0.
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(self.illegal(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.progress = 0;
        self.set_stage(&PipelineStage::Failed);
        self.error_message = Some(truncate(message.into(), MAX_ERROR_LEN));
        self.finish(now);
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        self.duration_seconds = self
            .started_at
            .map(|started| (now - started).num_seconds().max(0));
        self.updated_at = now;
    }

    fn set_stage(&mut self, stage: &PipelineStage) {
        self.current_stage = Some(truncate(stage.description(), MAX_STAGE_LEN));
    }

    fn illegal(&self, to: JobStatus) -> DomainError {
        DomainError::IllegalTransition {
            from: self.status.as_str(),
            to: to.as_str(),
        }
    }
}

fn truncate(mut s: String, max_chars: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
    }
    s
}
