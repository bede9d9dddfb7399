//! # mp_envsensor - Environment sensors for mackerel-agent
//!
//! Reads temperature, pressure, humidity and light sensors wired to a
//! Raspberry Pi's I2C bus and reports them as mackerel-agent plugin metrics.
//!
//! ## Features
//!
//! - **Best-effort collection**: a failed sensor only drops its own metrics
//! - **Derived metrics**: absolute humidity from temperature and relative humidity
//! - **Two naming profiles**: model-qualified keys under wildcard graphs, or flat keys
//! - **Status lamps**: success and failure LEDs on two GPIO pins (feature-gated)
//! - **Library + Binary**: use as a crate or as a standalone plugin
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mp_envsensor::{Collector, DefaultPlatform, MetricsPlugin, PluginConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collector = Collector::new(DefaultPlatform::new(), PluginConfig::default());
//!     let snapshot = collector.fetch_metrics().await?;
//!     for (key, value) in snapshot.iter() {
//!         println!("{} = {}", key, value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod hardware;
pub mod metrics;
pub mod output;

// Re-export public API
pub use config::PluginConfig;
pub use error::{PluginError, Result};
pub use hardware::{
    ClimateSensor, DefaultPlatform, DeviceSet, LightSensor, Platform, SensorModel, StatusLamp,
    StatusLamps,
};
pub use metrics::{
    absolute_humidity,
    collector::Collector,
    data::{Category, MetricSnapshot},
    schema::{GraphDefinition, GraphSchema, Profile},
    traits::MetricsPlugin,
};

/// The default metric key prefix
pub const DEFAULT_PREFIX: &str = "bme280";

/// I2C bus the sensors are wired to (`/dev/i2c-1`)
pub const I2C_BUS: u8 = 1;

/// BCM pin of the success lamp
pub const SUCCESS_LAMP_PIN: u8 = 17;

/// BCM pin of the failure lamp
pub const FAILURE_LAMP_PIN: u8 = 18;
