//! Class label ↔ product mapping.

use std::collections::BTreeMap;

use skuvision_core::{DomainError, ProductId};

/// Ordered product ids; the position of a product is its class label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    product_ids: Vec<ProductId>,
}

impl ClassIndex {
    pub fn new(product_ids: Vec<ProductId>) -> Self {
        Self { product_ids }
    }

    pub fn len(&self) -> usize {
        self.product_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty()
    }

    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    pub fn product_for(&self, label: usize) -> Option<ProductId> {
        self.product_ids.get(label).copied()
    }

    pub fn label_for(&self, product_id: ProductId) -> Option<usize> {
        self.product_ids.iter().position(|p| *p == product_id)
    }

    /// Mapping in the shape written to `product_mapping.json`.
    ///
    /// Integer keys serialize as JSON strings and sort numerically.
    pub fn to_mapping(&self) -> BTreeMap<usize, String> {
        self.product_ids
            .iter()
            .enumerate()
            .map(|(label, id)| (label, id.to_string()))
            .collect()
    }

    /// Rebuild from a decoded mapping. Labels must be exactly `0..n`.
    pub fn from_mapping(mapping: &BTreeMap<usize, String>) -> Result<Self, DomainError> {
        let mut product_ids = Vec::with_capacity(mapping.len());
        for (expected, (label, raw)) in mapping.iter().enumerate() {
            if *label != expected {
                return Err(DomainError::validation(format!(
                    "product mapping is missing label {expected}"
                )));
            }
            product_ids.push(raw.parse::<ProductId>()?);
        }
        Ok(Self { product_ids })
    }
}
