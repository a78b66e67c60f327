use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::loader::{ImageTensor, InputResolution};
use crate::result::{EpochReport, TrainError, TrainingOutcome};
use crate::split::TrainValSplit;
use crate::trainer::{TrainedModel, Trainer, TrainerConfig};

pub const ARCHITECTURE: &str = "LinearProbe";

/// File holding the model description and weights manifest.
pub const MODEL_FILE: &str = "model.json";

/// Single weight shard, little-endian float32.
pub const WEIGHTS_FILE: &str = "group1-shard1of1.bin";

/// Softmax classifier over average-pooled pixels.
///
/// Model:
/// - Average-pool each RGB tensor onto a `grid x grid` cell layout per channel.
/// - Fit a linear layer + softmax with seeded mini-batch SGD.
/// - Optionally mirror training samples horizontally per step.
#[derive(Debug, Clone)]
pub struct LinearProbeTrainer {
    config: TrainerConfig,
    /// Pooling grid side (must be >= 1).
    pool_grid: u32,
}

impl LinearProbeTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            pool_grid: 8,
        }
    }

    pub fn with_pool_grid(mut self, pool_grid: u32) -> Self {
        self.pool_grid = pool_grid;
        self
    }

    fn validate(&self, data: &TrainValSplit, num_classes: usize) -> Result<(), TrainError> {
        if num_classes < 2 {
            return Err(TrainError::InvalidInput(format!(
                "need at least 2 classes, got {num_classes}"
            )));
        }
        if self.pool_grid == 0 {
            return Err(TrainError::InvalidInput("pool grid must be >= 1".to_string()));
        }
        if self.config.input_resolution.width == 0 || self.config.input_resolution.height == 0 {
            return Err(TrainError::InvalidInput("input resolution must be non-zero".to_string()));
        }
        if self.config.batch_size == 0 || self.config.epochs == 0 {
            return Err(TrainError::InvalidInput(
                "batch size and epochs must be >= 1".to_string(),
            ));
        }
        if !(self.config.learning_rate.is_finite() && self.config.learning_rate > 0.0) {
            return Err(TrainError::InvalidInput(
                "learning rate must be a finite positive number".to_string(),
            ));
        }
        if data.train.is_empty() || data.validation.is_empty() {
            return Err(TrainError::InvalidInput(
                "training and validation sets must both be non-empty".to_string(),
            ));
        }

        let expected = self.config.input_resolution;
        for (idx, sample) in data.train.iter().chain(&data.validation).enumerate() {
            let expected_len = expected.width as usize * expected.height as usize * ImageTensor::CHANNELS;
            if sample.tensor.resolution() != expected || sample.tensor.data.len() != expected_len {
                return Err(TrainError::InvalidInput(format!(
                    "sample {idx} has shape {}x{} ({} values), expected {}x{}x3",
                    sample.tensor.width,
                    sample.tensor.height,
                    sample.tensor.data.len(),
                    expected.width,
                    expected.height
                )));
            }
            if sample.label >= num_classes {
                return Err(TrainError::InvalidInput(format!(
                    "sample {idx} has label {} but only {num_classes} classes exist",
                    sample.label
                )));
            }
        }
        Ok(())
    }
}

impl Trainer for LinearProbeTrainer {
    fn architecture(&self) -> &str {
        ARCHITECTURE
    }

    fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn train(
        &self,
        data: &TrainValSplit,
        num_classes: usize,
        on_epoch: &mut dyn FnMut(&EpochReport),
    ) -> Result<TrainingOutcome, TrainError> {
        self.validate(data, num_classes)?;

        let grid = self.pool_grid;
        let dims = feature_len(grid);
        let plain: Vec<Vec<f32>> = data
            .train
            .iter()
            .map(|s| pooled_features(&s.tensor, grid, false))
            .collect();
        let mirrored: Vec<Vec<f32>> = if self.config.augment_flip {
            data.train
                .iter()
                .map(|s| pooled_features(&s.tensor, grid, true))
                .collect()
        } else {
            Vec::new()
        };
        let labels: Vec<usize> = data.train.iter().map(|s| s.label).collect();

        let mut weights = vec![0.0f64; num_classes * dims];
        let mut bias = vec![0.0f64; num_classes];
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..plain.len()).collect();
        let mut history = Vec::with_capacity(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0;
            let mut correct = 0usize;

            for batch in order.chunks(self.config.batch_size) {
                let mut grad_w = vec![0.0f64; num_classes * dims];
                let mut grad_b = vec![0.0f64; num_classes];

                for &i in batch {
                    let x = if self.config.augment_flip && rng.gen_bool(0.5) {
                        &mirrored[i]
                    } else {
                        &plain[i]
                    };
                    let y = labels[i];
                    let probs = softmax(&logits(&weights, &bias, x, num_classes));

                    loss_sum -= probs[y].max(1e-12).ln();
                    if argmax(&probs) == y {
                        correct += 1;
                    }

                    for (k, p) in probs.iter().enumerate() {
                        let g = p - if k == y { 1.0 } else { 0.0 };
                        grad_b[k] += g;
                        let row = &mut grad_w[k * dims..(k + 1) * dims];
                        for (gw, xv) in row.iter_mut().zip(x) {
                            *gw += g * f64::from(*xv);
                        }
                    }
                }

                let scale = self.config.learning_rate / batch.len() as f64;
                for (w, g) in weights.iter_mut().zip(&grad_w) {
                    *w -= scale * g;
                }
                for (b, g) in bias.iter_mut().zip(&grad_b) {
                    *b -= scale * g;
                }
            }

            let n = plain.len() as f64;
            let train_loss = loss_sum / n;
            if !train_loss.is_finite() {
                return Err(TrainError::Diverged(format!(
                    "non-finite loss at epoch {epoch}"
                )));
            }

            let report = EpochReport {
                epoch,
                total_epochs: self.config.epochs,
                train_loss,
                train_accuracy: correct as f64 / n,
            };
            on_epoch(&report);
            history.push(report);
        }

        let model = LinearProbeModel {
            resolution: self.config.input_resolution,
            pool_grid: grid,
            num_classes,
            weights: weights.iter().map(|w| *w as f32).collect(),
            bias: bias.iter().map(|b| *b as f32).collect(),
        };

        let hits = data
            .validation
            .iter()
            .filter(|s| model.predict(&s.tensor) == s.label)
            .count();
        let validation_accuracy = hits as f64 / data.validation.len() as f64;

        tracing::info!(
            validation_accuracy,
            epochs = self.config.epochs,
            classes = num_classes,
            "training complete"
        );

        Ok(TrainingOutcome {
            model: Box::new(model),
            validation_accuracy,
            history,
        })
    }
}

/// Fitted linear probe. Weights are class-major: `weights[k * dims + j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProbeModel {
    resolution: InputResolution,
    pool_grid: u32,
    num_classes: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl LinearProbeModel {
    pub fn predict(&self, tensor: &ImageTensor) -> usize {
        let x = pooled_features(tensor, self.pool_grid, false);
        let dims = x.len();
        let scores: Vec<f64> = (0..self.num_classes)
            .map(|k| {
                let row = &self.weights[k * dims..(k + 1) * dims];
                let dot: f64 = row
                    .iter()
                    .zip(&x)
                    .map(|(w, v)| f64::from(*w) * f64::from(*v))
                    .sum();
                dot + f64::from(self.bias[k])
            })
            .collect();
        argmax(&scores)
    }
}

impl TrainedModel for LinearProbeModel {
    fn architecture(&self) -> &str {
        ARCHITECTURE
    }

    fn input_resolution(&self) -> InputResolution {
        self.resolution
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn write_artifacts(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let dims = feature_len(self.pool_grid);

        // Kernel is written input-major ([dims, classes]), then bias.
        let mut bytes = Vec::with_capacity((self.weights.len() + self.bias.len()) * 4);
        for j in 0..dims {
            for k in 0..self.num_classes {
                bytes.extend_from_slice(&self.weights[k * dims + j].to_le_bytes());
            }
        }
        for b in &self.bias {
            bytes.extend_from_slice(&b.to_le_bytes());
        }

        let descriptor = json!({
            "format": "linear-probe",
            "generatedBy": "skuvision",
            "architecture": ARCHITECTURE,
            "inputShape": [self.resolution.height, self.resolution.width, 3],
            "poolGrid": self.pool_grid,
            "numClasses": self.num_classes,
            "weightsManifest": [{
                "paths": [WEIGHTS_FILE],
                "weights": [
                    {"name": "dense/kernel", "shape": [dims, self.num_classes], "dtype": "float32"},
                    {"name": "dense/bias", "shape": [self.num_classes], "dtype": "float32"},
                ],
            }],
        });

        let model_path = dir.join(MODEL_FILE);
        let weights_path = dir.join(WEIGHTS_FILE);
        fs::write(&model_path, serde_json::to_vec_pretty(&descriptor)?)?;
        fs::write(&weights_path, bytes)?;
        Ok(vec![model_path, weights_path])
    }
}

fn feature_len(grid: u32) -> usize {
    (grid as usize) * (grid as usize) * ImageTensor::CHANNELS
}

/// Mean of each channel over a `grid x grid` partition of the image.
fn pooled_features(tensor: &ImageTensor, grid: u32, mirrored: bool) -> Vec<f32> {
    let mut out = Vec::with_capacity(feature_len(grid));
    let (w, h) = (tensor.width.max(1), tensor.height.max(1));

    for gy in 0..grid {
        let (y0, y1) = cell_bounds(gy, grid, h);
        for gx in 0..grid {
            let (x0, x1) = cell_bounds(gx, grid, w);
            let mut sums = [0.0f64; ImageTensor::CHANNELS];
            let mut count = 0usize;
            for y in y0..y1 {
                for x in x0..x1 {
                    let sx = if mirrored { w - 1 - x } else { x };
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += f64::from(tensor.at(sx, y, c));
                    }
                    count += 1;
                }
            }
            for sum in sums {
                out.push((sum / count.max(1) as f64) as f32);
            }
        }
    }
    out
}

/// Half-open pixel range covered by cell `i` of `n` along an axis of `len`.
/// Never empty, even when the image is smaller than the grid.
fn cell_bounds(i: u32, n: u32, len: u32) -> (u32, u32) {
    let start = ((i as u64 * len as u64) / n as u64) as u32;
    let start = start.min(len - 1);
    let end = (((i as u64 + 1) * len as u64) / n as u64) as u32;
    (start, end.clamp(start + 1, len))
}

fn logits(weights: &[f64], bias: &[f64], x: &[f32], num_classes: usize) -> Vec<f64> {
    let dims = x.len();
    (0..num_classes)
        .map(|k| {
            let row = &weights[k * dims..(k + 1) * dims];
            row.iter().zip(x).map(|(w, v)| w * f64::from(*v)).sum::<f64>() + bias[k]
        })
        .collect()
}

fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn argmax(xs: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in xs.iter().enumerate() {
        if *v > xs[best] {
            best = i;
        }
    }
    best
}
