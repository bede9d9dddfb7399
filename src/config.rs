//! Plugin configuration.

use crate::metrics::Profile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration handed to the collector by the command line layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Prefix for every metric key on output
    pub prefix: String,
    /// State file for counter deltas. None of this plugin's metrics are
    /// counters, so it is carried but never read or written.
    pub tempfile: Option<PathBuf>,
    /// Device inventory and key naming convention
    pub profile: Profile,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            prefix: crate::DEFAULT_PREFIX.to_string(),
            tempfile: None,
            profile: Profile::default(),
        }
    }
}

impl PluginConfig {
    /// Create a new configuration with a custom metric key prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Set the metric key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the temp file path.
    pub fn with_tempfile(mut self, tempfile: Option<PathBuf>) -> Self {
        self.tempfile = tempfile;
        self
    }

    /// Set the schema profile.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// The prefix in effect; an empty prefix falls back to the default.
    pub fn metric_key_prefix(&self) -> &str {
        if self.prefix.is_empty() {
            crate::DEFAULT_PREFIX
        } else {
            &self.prefix
        }
    }
}
