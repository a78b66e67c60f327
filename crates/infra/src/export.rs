//! Versioned, write-once model artifacts.
//!
//! Layout under the output root:
//!
//! ```text
//! <output_root>/<version>/
//!     model.json, weight shards   (written by the model itself)
//!     product_mapping.json        {"0": "<product id>", ...}
//!     metadata.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use skuvision_ai::{ClassIndex, TrainedModel};
use skuvision_core::{DomainError, ModelVersion};

pub const MAPPING_FILE: &str = "product_mapping.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const DEFAULT_DESCRIPTION: &str = "Product photo classification model";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact directory already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize model: {0}")]
    Model(#[source] io::Error),

    #[error("invalid {file}: {source}")]
    Json {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid product mapping: {0}")]
    Mapping(#[from] DomainError),
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub num_products: usize,
    pub validation_accuracy: f64,
    pub model_architecture: String,
    /// `[width, height]`
    pub input_size: [u32; 2],
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ExportedArtifact {
    pub version: ModelVersion,
    pub directory: PathBuf,
    pub files: Vec<PathBuf>,
    pub metadata: ExportMetadata,
}

#[derive(Debug, Clone)]
pub struct ModelExporter {
    output_root: PathBuf,
    description: String,
}

impl ModelExporter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Write the artifact for `model` under a fresh version generated from `now`.
    ///
    /// The version directory must not exist yet.
    pub fn export(
        &self,
        model: &dyn TrainedModel,
        classes: &ClassIndex,
        validation_accuracy: f64,
        now: DateTime<Utc>,
    ) -> Result<ExportedArtifact, ExportError> {
        let version = ModelVersion::generate(now);

        fs::create_dir_all(&self.output_root).map_err(|source| ExportError::CreateDir {
            path: self.output_root.clone(),
            source,
        })?;
        let directory = self.output_root.join(version.as_str());
        fs::create_dir(&directory).map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => ExportError::AlreadyExists(directory.clone()),
            _ => ExportError::CreateDir {
                path: directory.clone(),
                source,
            },
        })?;

        let mut files = model.write_artifacts(&directory).map_err(ExportError::Model)?;

        let mapping_path = directory.join(MAPPING_FILE);
        write_json(&mapping_path, MAPPING_FILE, &classes.to_mapping())?;
        files.push(mapping_path);

        let metadata = ExportMetadata {
            version: version.as_str().to_string(),
            trained_at: now,
            num_products: classes.len(),
            validation_accuracy,
            model_architecture: model.architecture().to_string(),
            input_size: model.input_resolution().as_pair(),
            description: self.description.clone(),
        };
        let metadata_path = directory.join(METADATA_FILE);
        write_json(&metadata_path, METADATA_FILE, &metadata)?;
        files.push(metadata_path);

        tracing::info!(
            version = %version,
            directory = %directory.display(),
            files = files.len(),
            "model exported"
        );

        Ok(ExportedArtifact {
            version,
            directory,
            files,
            metadata,
        })
    }
}

/// Read back the label → product mapping of an exported artifact.
pub fn read_product_mapping(artifact_dir: &Path) -> Result<ClassIndex, ExportError> {
    let path = artifact_dir.join(MAPPING_FILE);
    let bytes = fs::read(&path).map_err(|source| ExportError::Read { path, source })?;
    let mapping: BTreeMap<usize, String> = serde_json::from_slice(&bytes).map_err(|source| ExportError::Json {
        file: MAPPING_FILE,
        source,
    })?;
    Ok(ClassIndex::from_mapping(&mapping)?)
}

fn write_json<T: Serialize>(path: &Path, file: &'static str, value: &T) -> Result<(), ExportError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| ExportError::Json { file, source })?;
    fs::write(path, bytes).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}
