//! Stratified train/validation split.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::loader::Sample;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("no samples to split")]
    Empty,

    /// Retriable: more duplication can fix it.
    #[error(
        "The least populated class in y has only {count} member(s) (class {label}), which is too few. The minimum number of groups for any class cannot be less than 2."
    )]
    ClassTooSmall { label: usize, count: usize },
}

impl SplitError {
    pub fn is_class_too_small(&self) -> bool {
        matches!(self, SplitError::ClassTooSmall { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    /// Fraction of each class held out for validation.
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrainValSplit {
    pub train: Vec<Sample>,
    pub validation: Vec<Sample>,
}

impl TrainValSplit {
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split samples so every present class lands in both subsets.
///
/// Per class `n`, `round(n * fraction)` samples (clamped to `1..=n-1`) go to
/// validation. Classes with no samples are simply absent. Deterministic for a
/// given seed and input order.
pub fn stratified_split(samples: Vec<Sample>, config: &SplitConfig) -> Result<TrainValSplit, SplitError> {
    if samples.is_empty() {
        return Err(SplitError::Empty);
    }

    let mut by_label: BTreeMap<usize, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        by_label.entry(sample.label).or_default().push(sample);
    }

    if let Some((label, members)) = by_label.iter().find(|(_, members)| members.len() < 2) {
        return Err(SplitError::ClassTooSmall {
            label: *label,
            count: members.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut split = TrainValSplit::default();

    for (_, mut members) in by_label {
        let n = members.len();
        let n_val = ((n as f64) * config.validation_fraction)
            .round()
            .clamp(1.0, (n - 1) as f64) as usize;

        members.shuffle(&mut rng);
        let train = members.split_off(n_val);
        split.validation.extend(members);
        split.train.extend(train);
    }

    split.train.shuffle(&mut rng);
    Ok(split)
}
