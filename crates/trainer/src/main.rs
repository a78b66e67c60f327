//! Runs one training job end to end and exits 0 on success, 1 otherwise.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use skuvision_ai::LinearProbeTrainer;
use skuvision_infra::{JobOutcome, PostgresTrainingStore, run_job};
use skuvision_observability::TracingConfig;

mod args;

use args::Args;

fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    skuvision_observability::tracing::init_with(&TracingConfig::default().with_format(args.log_format));

    match run(&args) {
        Ok(outcome) => exit_code(&outcome),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "training job could not start");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<JobOutcome> {
    let job_id = args.job_id()?;
    tracing::info!(
        job_id = %job_id,
        storage_path = %args.storage_path.display(),
        output_path = %args.output_path.display(),
        epochs = args.epochs,
        image_size = args.image_size,
        "starting training job"
    );

    let store = PostgresTrainingStore::connect_lazy(&args.connection_string)
        .context("failed to configure database connection")?;
    let trainer = LinearProbeTrainer::new(args.trainer_config());

    let outcome = run_job(&store, &trainer, args.pipeline_config(), job_id);
    match &outcome {
        JobOutcome::Completed(summary) => tracing::info!(
            job_id = %job_id,
            version = %summary.version,
            validation_accuracy = summary.validation_accuracy,
            "training finished"
        ),
        JobOutcome::Failed {
            error,
            failure_recorded,
        } => tracing::error!(
            job_id = %job_id,
            error = %error,
            failure_recorded,
            "training finished with errors"
        ),
    }
    Ok(outcome)
}

fn exit_code(outcome: &JobOutcome) -> ExitCode {
    ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1))
}
