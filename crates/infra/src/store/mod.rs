//! Persistence of photo records, job rows and the model catalog.

mod in_memory;
mod postgres;
mod r#trait;

pub use in_memory::InMemoryTrainingStore;
pub use postgres::PostgresTrainingStore;
pub use r#trait::{StoreError, TrainingStore};
