//! Command-line arguments.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use skuvision_ai::{InputResolution, TrainerConfig};
use skuvision_core::JobId;
use skuvision_infra::PipelineConfig;
use skuvision_observability::LogFormat;

#[derive(Debug, Clone, Parser)]
#[command(name = "skuvision-trainer", version, about = "Train the product photo classifier for one job")]
pub struct Args {
    /// Training job id (UUID) created by the backend.
    #[arg(long, env = "SKUVISION_JOB_ID")]
    pub job_id: String,

    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub connection_string: String,

    /// Photo storage root (contains `products/<product-id>/`).
    #[arg(long, env = "SKUVISION_STORAGE_PATH")]
    pub storage_path: PathBuf,

    /// Root under which versioned model directories are written.
    #[arg(long, env = "SKUVISION_OUTPUT_PATH")]
    pub output_path: PathBuf,

    #[arg(long, default_value_t = 15)]
    pub epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Side of the square input resolution.
    #[arg(long, default_value_t = 224)]
    pub image_size: u32,

    #[arg(long, default_value_t = 0.05)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, env = "SKUVISION_LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,
}

impl Args {
    pub fn job_id(&self) -> anyhow::Result<JobId> {
        self.job_id
            .parse()
            .with_context(|| format!("invalid job id '{}'", self.job_id))
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::default()
            .with_input_resolution(InputResolution::square(self.image_size))
            .with_epochs(self.epochs)
            .with_batch_size(self.batch_size)
            .with_learning_rate(self.learning_rate)
            .with_seed(self.seed)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(&self.storage_path, &self.output_path)
    }
}
