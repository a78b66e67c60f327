//! Photo records as read from the catalog.

use serde::{Deserialize, Serialize};

use crate::id::{PhotoId, ProductId};

/// One product photo joined with its product.
///
/// This is the only shape the store hands out; adapters map their rows into it
/// at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub photo_id: PhotoId,
    pub product_id: ProductId,
    pub file_name: String,
    pub sku: String,
    pub product_name: String,
}

impl PhotoRecord {
    pub fn new(
        product_id: ProductId,
        file_name: impl Into<String>,
        sku: impl Into<String>,
        product_name: impl Into<String>,
    ) -> Self {
        Self {
            photo_id: PhotoId::new(),
            product_id,
            file_name: file_name.into(),
            sku: sku.into(),
            product_name: product_name.into(),
        }
    }
}
