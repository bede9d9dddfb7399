//! Graph definitions and metric key naming.
//!
//! The collector only accepts metric keys that a graph definition declares,
//! either by exact name or through a wildcard graph key (`temperature.#`).
//! Each [`Profile`] pairs a device inventory with one naming convention and
//! the schema that declares exactly the keys it emits.

use crate::error::PluginError;
use crate::hardware::SensorModel;
use crate::metrics::data::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How the collector renders a graph's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Float,
    Integer,
}

/// One line on a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDef {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub stacked: bool,
}

/// A named group of metrics sharing a unit and a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub label: String,
    pub unit: Unit,
    pub metrics: Vec<MetricDef>,
}

impl GraphDefinition {
    pub fn new(label: impl Into<String>, unit: Unit) -> Self {
        Self {
            label: label.into(),
            unit,
            metrics: Vec::new(),
        }
    }

    /// Append a metric line.
    pub fn with_metric(mut self, name: impl Into<String>, label: impl Into<String>) -> Self {
        self.metrics.push(MetricDef {
            name: name.into(),
            label: label.into(),
            stacked: false,
        });
        self
    }
}

/// All graph definitions of a plugin, keyed by graph key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphSchema {
    graphs: BTreeMap<String, GraphDefinition>,
}

impl GraphSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, key: impl Into<String>, graph: GraphDefinition) -> Self {
        self.graphs.insert(key.into(), graph);
        self
    }

    pub fn get(&self, key: &str) -> Option<&GraphDefinition> {
        self.graphs.get(key)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Graphs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GraphDefinition)> {
        self.graphs.iter().map(|(k, g)| (k.as_str(), g))
    }

    /// Whether a snapshot key is declared by some graph.
    pub fn declares(&self, key: &str) -> bool {
        self.iter().any(|(graph_key, graph)| {
            graph.metrics.iter().any(|metric| {
                let pattern = format!("{}.{}", graph_key, metric.name);
                if is_wildcard(&pattern) {
                    matches_pattern(&pattern, key)
                } else {
                    metric.name == key
                }
            })
        })
    }
}

/// Whether a graph key or metric name contains a wildcard segment.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['#', '*'])
}

/// Match a dotted key against a dotted pattern in which `#` and `*` each
/// stand for exactly one segment of `[-a-zA-Z0-9_]+`.
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let mut wanted = pattern.split('.');
    let mut got = key.split('.');
    loop {
        match (wanted.next(), got.next()) {
            (None, None) => return true,
            (Some(w), Some(g)) => {
                let ok = if w == "#" || w == "*" {
                    !g.is_empty()
                        && g
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                } else {
                    w == g
                };
                if !ok {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// A device inventory together with its metric naming convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// BME280, SHT2x and TSL2561; keys are `<category>.<MODEL>.<field>`
    /// under wildcard graphs, so several sensors can share one graph.
    #[default]
    Qualified,
    /// BME280 and TSL2561; keys are bare field names.
    Flat,
}

impl Profile {
    /// The sensors bound for every cycle, in read order.
    pub fn inventory(&self) -> &'static [SensorModel] {
        match self {
            Self::Qualified => &[SensorModel::Bme280, SensorModel::Sht2x, SensorModel::Tsl2561],
            Self::Flat => &[SensorModel::Bme280, SensorModel::Tsl2561],
        }
    }

    /// Snapshot key for `field` of `category` as read from `model`.
    pub fn key(&self, category: Category, model: SensorModel, field: &str) -> String {
        match self {
            Self::Qualified => format!("{}.{}.{}", category, model, field),
            Self::Flat if field == "value" => category.as_str().to_string(),
            Self::Flat => field.to_string(),
        }
    }

    /// Graph definitions declaring every key this profile emits.
    pub fn schema(&self) -> GraphSchema {
        Category::ALL
            .iter()
            .fold(GraphSchema::new(), |schema, &category| {
                let (key, graph) = self.graph(category);
                schema.with_graph(key, graph)
            })
    }

    fn graph(&self, category: Category) -> (String, GraphDefinition) {
        let (label, unit, fields): (&str, Unit, &[(&str, &str)]) = match category {
            Category::Temperature => ("Temperature (C)", Unit::Float, &[("value", "Temperature")][..]),
            Category::Pressure => ("Pressure (hPa)", Unit::Float, &[("value", "Pressure")][..]),
            Category::Humidity => ("Humidity (%)", Unit::Float, &[("value", "Humidity")][..]),
            Category::AbsHumidity => (
                "Absolute Humidity (g/m^3)",
                Unit::Float,
                &[("value", "Absolute Humidity")][..],
            ),
            Category::RawIllum => (
                "Illuminance (raw value)",
                Unit::Integer,
                &[("broadband", "Broadband light"), ("infrared", "Infrared light")][..],
            ),
            Category::Illuminance => ("Illuminance (lux)", Unit::Integer, &[("value", "Illuminance")][..]),
        };

        let graph_key = match self {
            Self::Qualified => format!("{}.#", category),
            Self::Flat => category.as_str().to_string(),
        };
        let graph = fields
            .iter()
            .fold(GraphDefinition::new(label, unit), |graph, (field, field_label)| {
                let name = match self {
                    Self::Qualified => field.to_string(),
                    // Only the field position matters for flat keys; the model is ignored.
                    Self::Flat => self.key(category, SensorModel::Bme280, field),
                };
                graph.with_metric(name, *field_label)
            });
        (graph_key, graph)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Qualified => "qualified",
            Self::Flat => "flat",
        })
    }
}

impl FromStr for Profile {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qualified" => Ok(Self::Qualified),
            "flat" => Ok(Self::Flat),
            other => Err(PluginError::config_error(format!(
                "Unknown profile '{}'. Use 'qualified' or 'flat'",
                other
            ))),
        }
    }
}
