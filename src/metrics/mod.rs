//! Metric collection, derivation and graph metadata.
//!
//! This module turns one pass over the bound sensors into a flat
//! name-to-value snapshot, and declares the graph groups those names belong to.

pub mod collector;
pub mod data;
pub mod humidity;
pub mod schema;
pub mod traits;

// Re-export commonly used items
pub use collector::Collector;
pub use data::{Category, MetricSnapshot};
pub use humidity::absolute_humidity;
pub use schema::{GraphDefinition, GraphSchema, Profile};
pub use traits::MetricsPlugin;
