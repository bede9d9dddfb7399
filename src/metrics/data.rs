//! Data structures for sensor metrics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The graph group a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Air temperature in °C
    Temperature,
    /// Barometric pressure in hPa
    Pressure,
    /// Relative humidity in %
    Humidity,
    /// Absolute humidity in g/m³
    AbsHumidity,
    /// Raw light sensor channel counts
    RawIllum,
    /// Illuminance in lux
    Illuminance,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Temperature,
        Category::Pressure,
        Category::Humidity,
        Category::AbsHumidity,
        Category::RawIllum,
        Category::Illuminance,
    ];

    /// First segment of the metric key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Humidity => "humidity",
            Self::AbsHumidity => "abs_humidity",
            Self::RawIllum => "raw_illum",
            Self::Illuminance => "illuminance",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cycle's successfully read and derived values, keyed by metric key.
///
/// A key is present only when its reading succeeded; there is no zero-fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSnapshot {
    values: HashMap<String, f64>,
}

impl MetricSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Keys in lexical order, for stable output.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        keys
    }
}
