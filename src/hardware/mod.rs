//! Sensor hardware: bus access, device capabilities and board binding.
//!
//! Each sensor is exposed through a small capability trait. A [`DeviceSet`]
//! holds the sensors bound for exactly one collection cycle and shuts every
//! one of them down when it is released or dropped.

pub mod bme280;
pub mod bus;
pub mod platform;
pub mod sht2x;
pub mod tsl2561;

pub use bus::{RegisterBus, SharedI2c};
pub use platform::{DefaultPlatform, Platform};

use crate::error::{PluginError, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, OutputPin, PinState};
use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::MutexDevice;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Sensor models this plugin knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorModel {
    /// Bosch combined temperature / pressure / humidity sensor
    Bme280,
    /// Sensirion SHT20/21/25 temperature / humidity sensor
    Sht2x,
    /// AMS/TAOS dual-channel ambient light sensor
    Tsl2561,
}

impl SensorModel {
    /// Model token used inside metric keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bme280 => "BME280",
            Self::Sht2x => "SHT2x",
            Self::Tsl2561 => "TSL2561",
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sensor that measures air temperature and humidity, and maybe pressure.
pub trait ClimateSensor: Send {
    fn model(&self) -> SensorModel;

    /// Temperature in degrees Celsius.
    fn temperature(&mut self) -> Result<f64>;

    /// Relative humidity in percent.
    fn humidity(&mut self) -> Result<f64>;

    /// Barometric pressure in pascal, or `None` when the device has no barometer.
    fn pressure(&mut self) -> Option<Result<f64>> {
        None
    }

    /// Put the device into its low-power state.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A dual-channel light sensor.
pub trait LightSensor: Send {
    fn model(&self) -> SensorModel;

    /// Raw `(broadband, infrared)` channel counts.
    fn luminosity(&mut self) -> Result<(u16, u16)>;

    /// Illuminance in lux computed from the raw channels.
    fn lux(&self, broadband: u16, infrared: u16) -> u32;

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The sensors bound for one collection cycle.
#[derive(Default)]
pub struct DeviceSet {
    climate: Vec<Box<dyn ClimateSensor>>,
    light: Vec<Box<dyn LightSensor>>,
    released: bool,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize every device in `inventory` on `bus`, in order. Each
    /// driver gets its own proxy on the bus and its own delay from `delay`.
    ///
    /// Fails on the first device that does not come up; devices already
    /// initialized are shut down again when the partial set is dropped.
    pub fn bind<B, D>(
        bus: &'static Mutex<B>,
        mut delay: impl FnMut() -> D,
        inventory: &[SensorModel],
    ) -> Result<Self>
    where
        B: I2c + Send + 'static,
        D: DelayNs + Send + 'static,
    {
        let mut devices = Self::new();
        for model in inventory {
            debug!(%model, "initializing sensor");
            let i2c: SharedI2c<B> = MutexDevice::new(bus);
            match model {
                SensorModel::Bme280 => {
                    devices.push_climate(Box::new(bme280::Bme280::new(i2c, delay())?))
                }
                SensorModel::Sht2x => {
                    devices.push_climate(Box::new(sht2x::Sht2x::new(i2c, delay())?))
                }
                SensorModel::Tsl2561 => {
                    devices.push_light(Box::new(tsl2561::Tsl2561::new(i2c, delay())?))
                }
            }
        }
        Ok(devices)
    }

    pub fn push_climate(&mut self, sensor: Box<dyn ClimateSensor>) {
        self.climate.push(sensor);
    }

    pub fn push_light(&mut self, sensor: Box<dyn LightSensor>) {
        self.light.push(sensor);
    }

    pub fn with_climate(mut self, sensor: impl ClimateSensor + 'static) -> Self {
        self.push_climate(Box::new(sensor));
        self
    }

    pub fn with_light(mut self, sensor: impl LightSensor + 'static) -> Self {
        self.push_light(Box::new(sensor));
        self
    }

    pub fn climate_sensors(&mut self) -> &mut [Box<dyn ClimateSensor>] {
        &mut self.climate
    }

    pub fn light_sensors(&mut self) -> &mut [Box<dyn LightSensor>] {
        &mut self.light
    }

    pub fn len(&self) -> usize {
        self.climate.len() + self.light.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every device. Consumes the set so it cannot be read afterwards.
    pub fn release(mut self) {
        self.shutdown_all();
    }

    fn shutdown_all(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for sensor in &mut self.climate {
            if let Err(e) = sensor.shutdown() {
                warn!(model = %sensor.model(), "failed to stop sensor: {}", e);
            }
        }
        for sensor in &mut self.light {
            if let Err(e) = sensor.shutdown() {
                warn!(model = %sensor.model(), "failed to stop sensor: {}", e);
            }
        }
    }
}

impl Drop for DeviceSet {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

/// A single on/off indicator. Any output pin is one.
pub trait StatusLamp: Send {
    fn set(&mut self, lit: bool) -> Result<()>;
}

impl<P: OutputPin + Send> StatusLamp for P {
    fn set(&mut self, lit: bool) -> Result<()> {
        self.set_state(PinState::from(lit))
            .map_err(|e| PluginError::gpio_error(format!("{:?}", e.kind())))
    }
}

/// Lamp that is not wired to anything.
pub struct NoLamp;

impl embedded_hal::digital::ErrorType for NoLamp {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoLamp {
    fn set_low(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// The success and failure lamps.
///
/// Lamp errors never fail a cycle; they are logged and otherwise ignored.
pub struct StatusLamps {
    success: Box<dyn StatusLamp>,
    failure: Box<dyn StatusLamp>,
}

impl StatusLamps {
    pub fn new(success: Box<dyn StatusLamp>, failure: Box<dyn StatusLamp>) -> Self {
        Self { success, failure }
    }

    /// Lamps for a board without indicators.
    pub fn detached() -> Self {
        Self::new(Box::new(NoLamp), Box::new(NoLamp))
    }

    /// Clear the failure lamp before devices are acquired.
    pub fn clear_failure(&mut self) {
        Self::drive(self.failure.as_mut(), false, "failure");
    }

    /// Light the success lamp while a cycle is running.
    pub fn signal_running(&mut self) {
        Self::drive(self.success.as_mut(), true, "success");
    }

    /// Acquisition failed: success lamp off, failure lamp on.
    pub fn signal_failed(&mut self) {
        Self::drive(self.success.as_mut(), false, "success");
        Self::drive(self.failure.as_mut(), true, "failure");
    }

    fn drive(lamp: &mut dyn StatusLamp, lit: bool, name: &str) {
        if let Err(e) = lamp.set(lit) {
            warn!("failed to switch {} lamp {}: {}", name, if lit { "on" } else { "off" }, e);
        }
    }
}
