//! Board binding: where the bus and the status lamps come from.
//!
//! The Raspberry Pi binding is feature-gated so the crate still builds, and
//! its collection logic can be tested, on machines without the hardware.

use super::{DeviceSet, SensorModel, StatusLamps};
use crate::error::Result;

/// Opens the hardware for one collection cycle.
pub trait Platform: Send + Sync {
    /// Claim the success and failure lamps.
    fn status_lamps(&self) -> Result<StatusLamps>;

    /// Open the bus and initialize every device in `inventory`.
    fn acquire(&self, inventory: &[SensorModel]) -> Result<DeviceSet>;
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use crate::error::PluginError;
    use crate::hardware::StatusLamp;
    use rppal::gpio::Gpio;
    use rppal::hal::Delay;
    use rppal::i2c::I2c;
    use std::sync::{Mutex, OnceLock};

    /// Bus opened on the first acquisition and kept for the process lifetime.
    static SHARED_BUS: OnceLock<Mutex<I2c>> = OnceLock::new();

    /// Raspberry Pi with sensors on I2C bus 1 and lamps on two BCM pins.
    pub struct RaspberryPi {
        success_pin: u8,
        failure_pin: u8,
    }

    impl Default for RaspberryPi {
        fn default() -> Self {
            Self {
                success_pin: crate::SUCCESS_LAMP_PIN,
                failure_pin: crate::FAILURE_LAMP_PIN,
            }
        }
    }

    impl RaspberryPi {
        pub fn new() -> Self {
            Self::default()
        }

        fn claim_lamp(gpio: &Gpio, pin: u8) -> Result<Box<dyn StatusLamp>> {
            let mut output = gpio
                .get(pin)
                .map_err(|e| PluginError::gpio_error(format!("Failed to claim pin {}: {}", pin, e)))?
                .into_output();
            // Lamp state must outlive the cycle that set it.
            output.set_reset_on_drop(false);
            Ok(Box::new(output))
        }

        fn bus() -> Result<&'static Mutex<I2c>> {
            if let Some(bus) = SHARED_BUS.get() {
                return Ok(bus);
            }
            let i2c = I2c::with_bus(crate::I2C_BUS).map_err(|e| {
                PluginError::bus_error(format!("Failed to open I2C bus {}: {}", crate::I2C_BUS, e))
            })?;
            Ok(SHARED_BUS.get_or_init(|| Mutex::new(i2c)))
        }
    }

    impl Platform for RaspberryPi {
        fn status_lamps(&self) -> Result<StatusLamps> {
            let gpio = Gpio::new().map_err(|e| {
                PluginError::gpio_error(format!("Failed to initialize GPIO: {}", e))
            })?;
            Ok(StatusLamps::new(
                Self::claim_lamp(&gpio, self.success_pin)?,
                Self::claim_lamp(&gpio, self.failure_pin)?,
            ))
        }

        fn acquire(&self, inventory: &[SensorModel]) -> Result<DeviceSet> {
            DeviceSet::bind(Self::bus()?, Delay::new, inventory)
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod unavailable {
    use super::*;
    use crate::error::PluginError;

    /// Stand-in for systems without sensor hardware support compiled in.
    #[derive(Default)]
    pub struct Unavailable;

    impl Unavailable {
        pub fn new() -> Self {
            Self
        }
    }

    impl Platform for Unavailable {
        fn status_lamps(&self) -> Result<StatusLamps> {
            Ok(StatusLamps::detached())
        }

        fn acquire(&self, inventory: &[SensorModel]) -> Result<DeviceSet> {
            if inventory.is_empty() {
                return Ok(DeviceSet::new());
            }
            Err(PluginError::bus_error(
                "I2C bus not available on this system (built without the `gpio` feature)",
            ))
        }
    }
}

// Re-export the appropriate platform
#[cfg(feature = "gpio")]
pub use raspberry_pi::RaspberryPi as DefaultPlatform;

#[cfg(not(feature = "gpio"))]
pub use unavailable::Unavailable as DefaultPlatform;
