//! mackerel-agent plugin output.
//!
//! Values go to stdout as `<key>\t<value>\t<epoch>` lines. When the agent sets
//! `MACKEREL_AGENT_PLUGIN_META`, graph definitions are printed instead.

use crate::error::Result;
use crate::metrics::{
    data::MetricSnapshot,
    schema::{is_wildcard, matches_pattern, GraphDefinition, GraphSchema},
    traits::MetricsPlugin,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use tracing::{debug, warn};

/// Environment variable that switches the plugin into definition mode.
pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

/// First line of the definition payload.
pub const META_HEADER: &str = "# mackerel-agent-plugin";

#[derive(Serialize)]
struct Definitions<'a> {
    graphs: BTreeMap<String, &'a GraphDefinition>,
}

/// Whether the agent asked for graph definitions.
pub fn definition_mode_requested() -> bool {
    std::env::var_os(META_ENV).is_some_and(|v| !v.is_empty())
}

/// Format a value the way the agent parses it; `None` for NaN and infinities.
pub fn format_value(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value == value.trunc() && value.abs() < i64::MAX as f64 {
        Some(format!("{}", value as i64))
    } else {
        Some(format!("{:.6}", value))
    }
}

/// Print every declared metric present in `snapshot`. Returns the line count.
///
/// Keys no graph declares are never printed.
pub fn write_values<W: Write>(
    out: &mut W,
    prefix: &str,
    schema: &GraphSchema,
    snapshot: &MetricSnapshot,
    timestamp: i64,
) -> io::Result<usize> {
    let mut written = 0;
    let mut emit = |out: &mut W, key: String, value: f64| -> io::Result<()> {
        match format_value(value) {
            Some(formatted) => {
                writeln!(out, "{}\t{}\t{}", key, formatted, timestamp)?;
                written += 1;
            }
            None => warn!("skipping {}: value {} is not finite", key, value),
        }
        Ok(())
    };

    for (graph_key, graph) in schema.iter() {
        for metric in &graph.metrics {
            let pattern = format!("{}.{}", graph_key, metric.name);
            if is_wildcard(&pattern) {
                for key in snapshot.sorted_keys() {
                    if matches_pattern(&pattern, key) {
                        if let Some(value) = snapshot.get(key) {
                            emit(&mut *out, join_key(prefix, key), value)?;
                        }
                    }
                }
            } else if let Some(value) = snapshot.get(&metric.name) {
                emit(&mut *out, join_key(prefix, &pattern), value)?;
            }
        }
    }

    for key in snapshot.keys().filter(|k| !schema.declares(k)) {
        debug!("metric {} is not declared by any graph, dropped", key);
    }
    Ok(written)
}

/// Print the definition header and the graph JSON.
pub fn write_definitions<W: Write>(out: &mut W, prefix: &str, schema: &GraphSchema) -> Result<()> {
    let graphs = schema
        .iter()
        .map(|(key, graph)| (join_key(prefix, key), graph))
        .collect();
    let payload = serde_json::to_string(&Definitions { graphs })
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(out, "{}", META_HEADER)?;
    writeln!(out, "{}", payload)?;
    Ok(())
}

/// Run the plugin once in whichever mode the agent requested.
pub async fn run<M: MetricsPlugin>(plugin: &M) -> Result<()> {
    if definition_mode_requested() {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        return write_definitions(&mut out, plugin.metric_key_prefix(), &plugin.graph_definition());
    }

    let snapshot = plugin.fetch_metrics().await?;
    let now = Utc::now().timestamp();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let lines = write_values(
        &mut out,
        plugin.metric_key_prefix(),
        &plugin.graph_definition(),
        &snapshot,
        now,
    )?;
    debug!("wrote {} metric lines", lines);
    Ok(())
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
