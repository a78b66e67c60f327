//! Bounded retry policy for under-represented classes.
//!
//! Each attempt duplicates entries up to a per-class threshold, decodes the
//! images and tries the stratified split. A split that fails because a class is
//! too small triggers the next attempt with `threshold + step`; files that
//! failed to decode are dropped before the next attempt duplicates anything.
//! Running out of attempts is `DatasetError::RemediationExhausted`.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::{AssembledDataset, DatasetError};
use crate::loader::{DecodeCache, ImageLoader};
use crate::split::{SplitConfig, TrainValSplit, stratified_split};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationPolicy {
    /// Minimum entries per class on the first attempt.
    pub initial_threshold: usize,
    /// Threshold increase per retry.
    pub step: usize,
    /// Total attempts, first one included.
    pub max_attempts: u32,
}

impl Default for RemediationPolicy {
    fn default() -> Self {
        Self {
            initial_threshold: 2,
            step: 1,
            max_attempts: 2,
        }
    }
}

impl RemediationPolicy {
    /// Threshold used on a given attempt (1-indexed).
    pub fn threshold_for_attempt(&self, attempt: u32) -> usize {
        let retries = attempt.saturating_sub(1) as usize;
        self.initial_threshold + self.step * retries
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Training data ready for the trainer.
#[derive(Debug)]
pub struct PreparedData {
    pub split: TrainValSplit,
    /// Attempt that produced the split (1-indexed).
    pub attempts: u32,
    pub threshold: usize,
    /// Decode failures of the successful attempt.
    pub skipped: usize,
}

/// Remediate, load and split under `policy`.
pub fn prepare_training_data(
    dataset: &AssembledDataset,
    loader: &ImageLoader,
    split_config: &SplitConfig,
    policy: &RemediationPolicy,
) -> Result<PreparedData, DatasetError> {
    let mut cache = DecodeCache::new();
    let mut excluded: HashSet<PathBuf> = HashSet::new();
    let mut attempt: u32 = 1;
    loop {
        let threshold = policy.threshold_for_attempt(attempt);
        let remediated = dataset.without_paths(&excluded).remediated(threshold);
        let loaded = loader.load_with_cache(&remediated, &mut cache);
        let skipped = loaded.skipped.len();

        match stratified_split(loaded.samples, split_config) {
            Ok(split) => {
                return Ok(PreparedData {
                    split,
                    attempts: attempt,
                    threshold,
                    skipped,
                });
            }
            Err(e) if e.is_class_too_small() && policy.should_retry(attempt) => {
                tracing::warn!(
                    attempt,
                    threshold,
                    next_threshold = policy.threshold_for_attempt(attempt + 1),
                    undecodable = cache.failed_paths().len(),
                    error = %e,
                    "stratified split failed; retrying with more duplication"
                );
                excluded = cache.failed_paths();
                attempt += 1;
            }
            Err(e) if e.is_class_too_small() => {
                return Err(DatasetError::RemediationExhausted {
                    attempts: attempt,
                    threshold,
                    source: e,
                });
            }
            Err(e) => return Err(e.into()),
        }
    }
}
