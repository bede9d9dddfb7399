//! Register access over a shared `embedded_hal` I2C bus.
//!
//! The bus is opened once and parked behind a mutex for the rest of the
//! process. Every driver gets its own [`SharedI2c`] proxy, which holds the
//! lock for exactly one transaction.

use crate::error::{PluginError, Result};
use embedded_hal::i2c::{Error as _, I2c};

/// A driver's handle on a bus it shares with the other drivers.
pub type SharedI2c<B> = embedded_hal_bus::i2c::MutexDevice<'static, B>;

fn transfer_error<E: embedded_hal::i2c::Error>(address: u8, error: E) -> PluginError {
    PluginError::bus_error(format!(
        "transfer with 0x{:02x} failed ({:?}): {:?}",
        address,
        error.kind(),
        error
    ))
}

/// Register-style transfers on any [`I2c`] bus, failing with [`PluginError::Bus`].
pub trait RegisterBus {
    /// Write `bytes` to the device at `address`.
    fn send(&mut self, address: u8, bytes: &[u8]) -> Result<()>;

    /// Fill `buffer` from the device at `address`.
    fn receive(&mut self, address: u8, buffer: &mut [u8]) -> Result<()>;

    /// Read consecutive registers starting at `register`.
    fn read_registers(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()>;

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.read_registers(address, register, &mut value)?;
        Ok(value[0])
    }

    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<()> {
        self.send(address, &[register, value])
    }
}

impl<T: I2c> RegisterBus for T {
    fn send(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        self.write(address, bytes)
            .map_err(|e| transfer_error(address, e))
    }

    fn receive(&mut self, address: u8, buffer: &mut [u8]) -> Result<()> {
        self.read(address, buffer)
            .map_err(|e| transfer_error(address, e))
    }

    fn read_registers(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()> {
        self.write_read(address, &[register], buffer)
            .map_err(|e| transfer_error(address, e))
    }
}
