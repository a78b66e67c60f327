//! Image decoding into fixed-shape normalized tensors.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::AssembledDataset;

/// Model input resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputResolution {
    pub width: u32,
    pub height: u32,
}

impl InputResolution {
    pub fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    /// `[width, height]`, the shape stored in artifact metadata.
    pub fn as_pair(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}

impl Default for InputResolution {
    fn default() -> Self {
        Self::square(224)
    }
}

/// RGB pixels in `[0, 1]`, row-major, channels interleaved (HWC).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub const CHANNELS: usize = 3;

    pub fn resolution(&self) -> InputResolution {
        InputResolution {
            width: self.width,
            height: self.height,
        }
    }

    /// Channel value at `(x, y, c)`.
    pub fn at(&self, x: u32, y: u32, c: usize) -> f32 {
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS + c;
        self.data[idx]
    }
}

/// A decoded image and its class label.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub tensor: ImageTensor,
    pub label: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Result of loading a whole dataset.
#[derive(Debug, Default)]
pub struct LoadedSamples {
    pub samples: Vec<Sample>,
    /// Files that failed to decode, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Decode results keyed by path, reused across load passes.
///
/// Each distinct file is decoded at most once; failures are remembered too.
#[derive(Debug, Default)]
pub struct DecodeCache {
    entries: HashMap<PathBuf, Result<ImageTensor, String>>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct files decoded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files known to be undecodable.
    pub fn failed_paths(&self) -> HashSet<PathBuf> {
        self.entries
            .iter()
            .filter(|(_, result)| result.is_err())
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLoader {
    resolution: InputResolution,
}

impl ImageLoader {
    pub fn new(resolution: InputResolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> InputResolution {
        self.resolution
    }

    /// Decode one file: RGB, resized to the input resolution, scaled to `[0, 1]`.
    pub fn load_file(&self, path: &Path) -> Result<ImageTensor, LoadError> {
        let img = image::open(path).map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let rgb = img.to_rgb8();
        let resized = imageops::resize(
            &rgb,
            self.resolution.width,
            self.resolution.height,
            FilterType::Triangle,
        );

        let data = resized
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect();

        Ok(ImageTensor {
            width: self.resolution.width,
            height: self.resolution.height,
            data,
        })
    }

    /// Decode every entry of the dataset. Label = class position.
    ///
    /// Decode failures are logged and skipped; they never abort the load.
    pub fn load(&self, dataset: &AssembledDataset) -> LoadedSamples {
        self.load_with_cache(dataset, &mut DecodeCache::new())
    }

    /// Like [`ImageLoader::load`], decoding only files absent from `cache`.
    pub fn load_with_cache(
        &self,
        dataset: &AssembledDataset,
        cache: &mut DecodeCache,
    ) -> LoadedSamples {
        let mut out = LoadedSamples::default();

        for (label, class) in dataset.classes().iter().enumerate() {
            for path in &class.photos {
                let decoded = cache.entries.entry(path.clone()).or_insert_with(|| {
                    self.load_file(path).map_err(|e| {
                        tracing::warn!(
                            product_id = %class.product_id,
                            path = %path.display(),
                            error = %e,
                            "failed to load photo; skipping"
                        );
                        e.to_string()
                    })
                });
                match decoded {
                    Ok(tensor) => out.samples.push(Sample {
                        tensor: tensor.clone(),
                        label,
                    }),
                    Err(reason) => out.skipped.push((path.clone(), reason.clone())),
                }
            }
        }

        tracing::info!(
            images = out.samples.len(),
            classes = dataset.num_classes(),
            skipped = out.skipped.len(),
            decoded_files = cache.len(),
            "loaded images"
        );
        out
    }
}
