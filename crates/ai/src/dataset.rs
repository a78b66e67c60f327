//! Dataset assembly: photo records → per-product file lists.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use skuvision_core::{PhotoRecord, ProductId};

use crate::labels::ClassIndex;
use crate::split::SplitError;

/// Minimum number of photo records a job needs.
pub const MIN_TOTAL_PHOTOS: usize = 10;

/// Minimum number of products with at least one usable photo.
pub const MIN_CLASSES: usize = 2;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Insufficient photos for training. Found: {found}, Required: {required}+")]
    InsufficientData { found: usize, required: usize },

    #[error("At least {required} products with photos required for training (found {found})")]
    InsufficientClasses { found: usize, required: usize },

    #[error(
        "class remediation exhausted after {attempts} attempt(s) (last threshold {threshold}): {source}"
    )]
    RemediationExhausted {
        attempts: u32,
        threshold: usize,
        #[source]
        source: SplitError,
    },

    #[error(transparent)]
    Split(#[from] SplitError),
}

/// Thresholds a dataset must clear before any image is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetRequirements {
    pub min_photos: usize,
    pub min_classes: usize,
}

impl Default for DatasetRequirements {
    fn default() -> Self {
        Self {
            min_photos: MIN_TOTAL_PHOTOS,
            min_classes: MIN_CLASSES,
        }
    }
}

/// One eligible product and the photo files that exist for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductClass {
    pub product_id: ProductId,
    pub sku: String,
    pub photos: Vec<PathBuf>,
}

/// Eligible classes in label order (label = position).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDataset {
    classes: Vec<ProductClass>,
    total_records: usize,
}

impl AssembledDataset {
    pub fn classes(&self) -> &[ProductClass] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Number of photo records the dataset was assembled from.
    pub fn total_records(&self) -> usize {
        self.total_records
    }

    /// Number of resolved file entries (duplicates included).
    pub fn total_entries(&self) -> usize {
        self.classes.iter().map(|c| c.photos.len()).sum()
    }

    pub fn class_index(&self) -> ClassIndex {
        ClassIndex::new(self.classes.iter().map(|c| c.product_id).collect())
    }

    /// Copy of the dataset without the given files.
    ///
    /// Labels are unchanged; a class may end up with no entries.
    pub fn without_paths(&self, excluded: &HashSet<PathBuf>) -> AssembledDataset {
        let classes = self
            .classes
            .iter()
            .map(|class| ProductClass {
                product_id: class.product_id,
                sku: class.sku.clone(),
                photos: class
                    .photos
                    .iter()
                    .filter(|p| !excluded.contains(*p))
                    .cloned()
                    .collect(),
            })
            .collect();

        AssembledDataset {
            classes,
            total_records: self.total_records,
        }
    }

    /// Copy of the dataset where every class holds at least `threshold` entries.
    ///
    /// Under-represented classes are topped up by cycling over their existing
    /// entries in order. Classes are never created from nothing and label order
    /// is preserved.
    pub fn remediated(&self, threshold: usize) -> AssembledDataset {
        let classes = self
            .classes
            .iter()
            .map(|class| {
                let mut photos = class.photos.clone();
                if !photos.is_empty() {
                    let original = photos.len();
                    let mut i = 0;
                    while photos.len() < threshold {
                        photos.push(class.photos[i % original].clone());
                        i += 1;
                    }
                }
                ProductClass {
                    product_id: class.product_id,
                    sku: class.sku.clone(),
                    photos,
                }
            })
            .collect();

        AssembledDataset {
            classes,
            total_records: self.total_records,
        }
    }
}

/// Resolved location of a product photo under the storage root.
pub fn photo_path(storage_root: &Path, product_id: ProductId, file_name: &str) -> PathBuf {
    storage_root
        .join("products")
        .join(product_id.to_string())
        .join(file_name)
}

/// Groups photo records by product and resolves them against the storage root.
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    storage_root: PathBuf,
    requirements: DatasetRequirements,
}

impl DatasetAssembler {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            requirements: DatasetRequirements::default(),
        }
    }

    pub fn with_requirements(mut self, requirements: DatasetRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Reject record sets that are too small before touching the filesystem.
    pub fn check_record_count(&self, records: &[PhotoRecord]) -> Result<(), DatasetError> {
        if records.len() < self.requirements.min_photos {
            return Err(DatasetError::InsufficientData {
                found: records.len(),
                required: self.requirements.min_photos,
            });
        }
        Ok(())
    }

    /// Build the class list.
    ///
    /// Classes appear in the order their product first shows up in `records`.
    /// Files missing on disk are dropped; products left with no file are not
    /// eligible.
    pub fn assemble(&self, records: &[PhotoRecord]) -> Result<AssembledDataset, DatasetError> {
        self.check_record_count(records)?;

        let mut order: Vec<ProductId> = Vec::new();
        let mut grouped: HashMap<ProductId, ProductClass> = HashMap::new();

        for record in records {
            let class = grouped.entry(record.product_id).or_insert_with(|| {
                order.push(record.product_id);
                ProductClass {
                    product_id: record.product_id,
                    sku: record.sku.clone(),
                    photos: Vec::new(),
                }
            });

            let path = photo_path(&self.storage_root, record.product_id, &record.file_name);
            if path.is_file() {
                class.photos.push(path);
            } else {
                tracing::debug!(
                    product_id = %record.product_id,
                    path = %path.display(),
                    "photo file missing; skipping"
                );
            }
        }

        let classes: Vec<ProductClass> = order
            .into_iter()
            .filter_map(|id| grouped.remove(&id))
            .filter(|c| !c.photos.is_empty())
            .collect();

        tracing::info!(
            products = classes.len(),
            records = records.len(),
            "found products with photos"
        );

        if classes.len() < self.requirements.min_classes {
            return Err(DatasetError::InsufficientClasses {
                found: classes.len(),
                required: self.requirements.min_classes,
            });
        }

        Ok(AssembledDataset {
            classes,
            total_records: records.len(),
        })
    }
}
