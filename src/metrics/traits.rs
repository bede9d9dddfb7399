//! Traits for sensor metrics plugins.

use crate::error::Result;
use crate::metrics::data::MetricSnapshot;
use crate::metrics::schema::GraphSchema;

/// A source of metrics in the shape the monitoring collector consumes.
///
/// Implementations declare their graphs statically and produce one fresh
/// snapshot per call. Callers must not run two `fetch_metrics` calls at once.
pub trait MetricsPlugin {
    /// Prefix prepended to every graph and metric key on output.
    fn metric_key_prefix(&self) -> &str;

    /// Graph definitions covering every key `fetch_metrics` can return.
    fn graph_definition(&self) -> GraphSchema;

    /// Run one collection cycle.
    ///
    /// Individual failed readings are left out of the snapshot; an error is
    /// returned only when the cycle could not run at all.
    fn fetch_metrics(&self) -> impl std::future::Future<Output = Result<MetricSnapshot>> + Send;
}
