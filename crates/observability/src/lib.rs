//! Process-wide tracing setup.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogFormat, TracingConfig};
