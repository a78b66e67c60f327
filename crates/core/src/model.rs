//! Trained model identity and catalog metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ModelMetadataId;

/// Version string of one trained artifact: `v<unix-seconds>_<YYYYMMDD>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(String);

impl ModelVersion {
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("v{}_{}", now.timestamp(), now.format("%Y%m%d")))
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the artifact relative to the model storage root.
    pub fn relative_path(&self) -> String {
        format!("models/{}", self.0)
    }
}

impl core::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accuracy document persisted with the model metadata row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub validation_accuracy: f64,
    pub top1: f64,
}

impl AccuracyMetrics {
    pub fn from_validation(validation_accuracy: f64) -> Self {
        Self {
            validation_accuracy,
            top1: validation_accuracy,
        }
    }
}

/// One row of the model catalog.
///
/// At most one row is active; activating a row deactivates every other one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: ModelMetadataId,
    pub version: ModelVersion,
    pub trained_at: DateTime<Utc>,
    pub model_path: String,
    pub accuracy: AccuracyMetrics,
    pub total_photos_used: i32,
    pub total_products_used: i32,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelMetadata {
    /// Metadata for a freshly trained model, marked active.
    pub fn activated(
        version: ModelVersion,
        trained_at: DateTime<Utc>,
        accuracy: AccuracyMetrics,
        total_photos_used: usize,
        total_products_used: usize,
    ) -> Self {
        Self {
            id: ModelMetadataId::new(),
            model_path: version.relative_path(),
            version,
            trained_at,
            accuracy,
            total_photos_used: saturating_i32(total_photos_used),
            total_products_used: saturating_i32(total_products_used),
            is_active: true,
            notes: None,
            created_at: trained_at,
            updated_at: trained_at,
        }
    }
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_combines_timestamp_and_date() {
        let now = DateTime::parse_from_rfc3339("2026-01-12T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let version = ModelVersion::generate(now);
        assert_eq!(version.as_str(), "v1768212000_20260112");
        assert_eq!(version.relative_path(), "models/v1768212000_20260112");
    }

    #[test]
    fn accuracy_serializes_both_keys() {
        let json = serde_json::to_value(AccuracyMetrics::from_validation(0.75)).unwrap();
        assert_eq!(json, serde_json::json!({"validation_accuracy": 0.75, "top1": 0.75}));
    }
}
