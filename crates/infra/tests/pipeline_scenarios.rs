//! End-to-end job scenarios against the in-memory store.
//!
//! Photo fixtures are real PNGs on a temporary storage root; training uses
//! either the bundled linear probe or a scripted trainer.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use chrono::Utc;
use image::{Rgb, RgbImage};
use tempfile::TempDir;

use skuvision_ai::{
    EpochReport, InputResolution, LinearProbeTrainer, TrainError, TrainValSplit, Trainer, TrainerConfig,
    TrainingOutcome, photo_path,
};
use skuvision_core::{
    AccuracyMetrics, JobId, JobStatus, ModelMetadata, ModelVersion, PhotoRecord, ProductId, TrainingJob,
};
use skuvision_infra::{
    InMemoryTrainingStore, JobOutcome, PipelineConfig, TrainingStore, read_product_mapping, run_job,
};

const SIDE: u32 = 16;

struct Fixture {
    dir: TempDir,
    store: InMemoryTrainingStore,
    job_id: JobId,
    products: Vec<ProductId>,
}

impl Fixture {
    /// One product per entry of `counts`, each photo a distinct solid color.
    fn new(counts: &[usize]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let mut records = Vec::new();
        let mut products = Vec::new();

        for (class, count) in counts.iter().enumerate() {
            let product = ProductId::new();
            products.push(product);
            for i in 0..*count {
                records.push(write_photo(&storage, product, class, i));
            }
        }

        let store = InMemoryTrainingStore::with_photos(records);
        let job_id = JobId::new();
        store.insert_job(TrainingJob::pending(job_id, Utc::now())).unwrap();

        Self {
            dir,
            store,
            job_id,
            products,
        }
    }

    fn output_root(&self) -> std::path::PathBuf {
        self.dir.path().join("output")
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new(self.dir.path().join("storage"), self.output_root())
    }

    fn run(&self, trainer: &dyn Trainer) -> JobOutcome {
        run_job(&self.store, trainer, self.config(), self.job_id)
    }

    fn job(&self) -> TrainingJob {
        self.store.job(self.job_id).unwrap()
    }
}

fn write_photo(storage: &Path, product: ProductId, class: usize, index: usize) -> PhotoRecord {
    let file = format!("photo_{index}.png");
    let path = photo_path(storage, product, &file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let base = [[220u8, 30, 30], [30, 220, 30], [30, 30, 220], [200, 200, 40]][class % 4];
    let shade = (index as u8).wrapping_mul(5);
    let pixel = Rgb([
        base[0].saturating_sub(shade),
        base[1].saturating_sub(shade),
        base[2].saturating_sub(shade),
    ]);
    RgbImage::from_pixel(SIDE + 8, SIDE + 8, pixel).save(&path).unwrap();

    PhotoRecord::new(product, file, format!("SKU-{class}"), format!("Product {class}"))
}

fn probe() -> LinearProbeTrainer {
    LinearProbeTrainer::new(
        TrainerConfig::default()
            .with_input_resolution(InputResolution::square(SIDE))
            .with_epochs(4)
            .with_batch_size(4)
            .with_learning_rate(0.5),
    )
    .with_pool_grid(4)
}

/// Trainer that reports `epochs_before_failure` epochs, then fails.
struct ScriptedTrainer {
    config: TrainerConfig,
    epochs_before_failure: usize,
    error: &'static str,
    calls: Cell<usize>,
}

impl ScriptedTrainer {
    fn failing_after(epochs_before_failure: usize, error: &'static str) -> Self {
        Self {
            config: TrainerConfig::default()
                .with_input_resolution(InputResolution::square(SIDE))
                .with_epochs(3),
            epochs_before_failure,
            error,
            calls: Cell::new(0),
        }
    }
}

impl Trainer for ScriptedTrainer {
    fn architecture(&self) -> &str {
        "Scripted"
    }

    fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn train(
        &self,
        _data: &TrainValSplit,
        _num_classes: usize,
        on_epoch: &mut dyn FnMut(&EpochReport),
    ) -> Result<TrainingOutcome, TrainError> {
        self.calls.set(self.calls.get() + 1);
        for epoch in 1..=self.epochs_before_failure {
            on_epoch(&EpochReport {
                epoch,
                total_epochs: self.config.epochs,
                train_loss: 1.0,
                train_accuracy: 0.5,
            });
        }
        Err(TrainError::Framework(self.error.to_string()))
    }
}

fn output_is_empty(fixture: &Fixture) -> bool {
    match fs::read_dir(fixture.output_root()) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[test]
fn twelve_photos_three_products_completes() {
    let fixture = Fixture::new(&[5, 4, 3]);

    let outcome = fixture.run(&probe());

    assert_eq!(outcome.exit_code(), 0, "{outcome:?}");
    let JobOutcome::Completed(summary) = outcome else {
        unreachable!()
    };
    assert_eq!(summary.photos_used, 12);
    assert_eq!(summary.products_used, 3);

    let job = fixture.job();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.result_model_version, Some(summary.version.clone()));
    assert!(job.completed_at.is_some());

    let active = fixture.store.active_model().unwrap().unwrap();
    assert_eq!(active.version, summary.version);
    assert_eq!(active.total_photos_used, 12);
    assert_eq!(active.total_products_used, 3);
    assert_eq!(active.model_path, format!("models/{}", summary.version));

    let mapping = read_product_mapping(&summary.artifact_dir).unwrap();
    assert_eq!(mapping.len(), 3);
    assert!(summary.artifact_dir.join("metadata.json").is_file());
    assert!(summary.artifact_dir.join("model.json").is_file());
}

#[test]
fn exported_mapping_reproduces_training_labels() {
    let fixture = Fixture::new(&[4, 3, 3, 2]);

    let JobOutcome::Completed(summary) = fixture.run(&probe()) else {
        panic!("job should complete");
    };

    let mapping = read_product_mapping(&summary.artifact_dir).unwrap();
    for (label, product) in fixture.products.iter().enumerate() {
        assert_eq!(mapping.product_for(label), Some(*product));
    }
}

#[test]
fn eight_photos_fail_without_training_or_output() {
    let fixture = Fixture::new(&[4, 4]);
    let trainer = ScriptedTrainer::failing_after(0, "unreachable");

    let outcome = fixture.run(&trainer);

    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(trainer.calls.get(), 0);
    assert!(output_is_empty(&fixture));

    let job = fixture.job();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0);
    assert_eq!(
        job.error_message.as_deref(),
        Some("Insufficient photos for training. Found: 8, Required: 10+")
    );
}

#[test]
fn single_product_fails_before_model_construction() {
    let fixture = Fixture::new(&[10]);
    let trainer = ScriptedTrainer::failing_after(0, "unreachable");

    let outcome = fixture.run(&trainer);

    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(trainer.calls.get(), 0);
    let reached: Vec<u8> = fixture
        .store
        .job_history(fixture.job_id)
        .iter()
        .map(|j| j.progress)
        .collect();
    assert!(reached.iter().all(|p| *p < 25), "{reached:?}");
    assert!(fixture.job().error_message.unwrap().contains("products with photos"));
}

#[test]
fn singleton_class_is_remediated_and_completes() {
    let fixture = Fixture::new(&[1, 9]);

    let outcome = fixture.run(&probe());

    let JobOutcome::Completed(summary) = outcome else {
        panic!("job should complete: {outcome:?}");
    };
    assert_eq!(summary.remediation_attempts, 1);
    assert_eq!(summary.products_used, 2);
    assert_eq!(summary.photos_used, 10);
}

#[test]
fn training_error_is_recorded_verbatim() {
    let fixture = Fixture::new(&[5, 5]);
    let trainer = ScriptedTrainer::failing_after(1, "device lost during epoch 2");

    let outcome = fixture.run(&trainer);

    assert_eq!(outcome.exit_code(), 1);
    match &outcome {
        JobOutcome::Failed {
            error,
            failure_recorded,
        } => {
            assert_eq!(error, "device lost during epoch 2");
            assert!(failure_recorded);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let job = fixture.job();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0);
    assert_eq!(job.error_message.as_deref(), Some("device lost during epoch 2"));
    assert!(job.duration_seconds.is_some());
    assert!(fixture.store.models().is_empty());
    assert!(output_is_empty(&fixture));

    // The epoch reported before the failure reached the store.
    assert!(
        fixture
            .store
            .job_history(fixture.job_id)
            .iter()
            .any(|j| j.progress == 46)
    );
}

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let fixture = Fixture::new(&[5, 4, 3]);

    assert!(fixture.run(&probe()).is_success());

    let history: Vec<u8> = fixture
        .store
        .job_history(fixture.job_id)
        .iter()
        .skip(1)
        .map(|j| j.progress)
        .collect();
    assert!(history.windows(2).all(|w| w[0] <= w[1]), "{history:?}");
    assert_eq!(history.last(), Some(&100));
    for milestone in [0, 5, 10, 20, 25, 30, 42, 55, 67, 80, 85, 95, 100] {
        assert!(history.contains(&milestone), "missing {milestone} in {history:?}");
    }
}

#[test]
fn previous_active_model_is_deactivated() {
    let fixture = Fixture::new(&[5, 5]);
    let previous = ModelMetadata::activated(
        ModelVersion::from_string("v1700000000_20231114"),
        Utc::now(),
        AccuracyMetrics::from_validation(0.4),
        20,
        2,
    );
    fixture.store.insert_model(previous.clone()).unwrap();

    assert!(fixture.run(&probe()).is_success());

    let models = fixture.store.models();
    assert_eq!(models.len(), 2);
    assert_eq!(models.iter().filter(|m| m.is_active).count(), 1);
    assert!(!models[0].is_active);
    assert!(models[1].is_active);
    assert_ne!(models[1].version, previous.version);
}

#[test]
fn progress_write_failures_do_not_fail_the_job() {
    let fixture = Fixture::new(&[5, 5]);
    fixture.store.fail_progress_writes(true);

    let outcome = fixture.run(&probe());

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(fixture.job().status, JobStatus::Completed);
}

#[test]
fn unrecordable_failure_still_exits_non_zero() {
    let fixture = Fixture::new(&[5, 5]);
    fixture.store.fail_terminal_writes(true);
    let trainer = ScriptedTrainer::failing_after(0, "out of memory");

    let outcome = fixture.run(&trainer);

    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(
        outcome,
        JobOutcome::Failed {
            failure_recorded: false,
            ..
        }
    ));
    assert_eq!(fixture.job().status, JobStatus::InProgress);
}

#[test]
fn missing_job_row_fails_without_running() {
    let fixture = Fixture::new(&[5, 5]);
    let trainer = ScriptedTrainer::failing_after(0, "unreachable");

    let outcome = run_job(&fixture.store, &trainer, fixture.config(), JobId::new());

    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(trainer.calls.get(), 0);
    assert_eq!(fixture.job().status, JobStatus::Pending);
}

#[test]
fn store_outage_while_fetching_fails_the_job() {
    let fixture = Fixture::new(&[5, 5]);
    fixture.store.fail_photo_fetch(true);

    let outcome = fixture.run(&probe());

    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(
        fixture.job().error_message.as_deref(),
        Some("connection error: simulated fetch failure")
    );
}
