//! Sensirion SHT2x (SHT20/21/25) humidity and temperature sensor.

use super::bus::RegisterBus;
use super::{ClimateSensor, SensorModel};
use crate::error::{PluginError, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

pub const SHT2X_ADDRESS: u8 = 0x40;

const CMD_TRIGGER_T_NO_HOLD: u8 = 0xF3;
const CMD_TRIGGER_RH_NO_HOLD: u8 = 0xF5;
const CMD_READ_USER_REGISTER: u8 = 0xE7;
const CMD_SOFT_RESET: u8 = 0xFE;

const SOFT_RESET_MS: u32 = 15;
/// Maximum conversion times at full (14/12 bit) resolution.
const TEMPERATURE_CONVERSION_MS: u32 = 85;
const HUMIDITY_CONVERSION_MS: u32 = 29;

const CRC_POLYNOMIAL: u8 = 0x31;
const STATUS_BITS: u16 = 0x0003;

/// CRC-8 (x^8 + x^5 + x^4 + 1, init 0) over a measurement word.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC_POLYNOMIAL
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// Convert a raw temperature word to degrees Celsius.
pub fn temperature_from_raw(raw: u16) -> f64 {
    -46.85 + 175.72 * (raw & !STATUS_BITS) as f64 / 65536.0
}

/// Convert a raw humidity word to percent relative humidity.
pub fn humidity_from_raw(raw: u16) -> f64 {
    -6.0 + 125.0 * (raw & !STATUS_BITS) as f64 / 65536.0
}

pub struct Sht2x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Sht2x<I2C, D> {
    /// Soft-reset the sensor and check that it answers.
    pub fn new(mut i2c: I2C, mut delay: D) -> Result<Self> {
        i2c.send(SHT2X_ADDRESS, &[CMD_SOFT_RESET])?;
        delay.delay_ms(SOFT_RESET_MS);
        i2c.read_register(SHT2X_ADDRESS, CMD_READ_USER_REGISTER)?;
        Ok(Self {
            i2c,
            delay,
            address: SHT2X_ADDRESS,
        })
    }

    fn measure(&mut self, command: u8, conversion_ms: u32) -> Result<u16> {
        self.i2c.send(self.address, &[command])?;
        self.delay.delay_ms(conversion_ms);

        let mut frame = [0u8; 3];
        self.i2c.receive(self.address, &mut frame)?;
        let expected = crc8(&frame[..2]);
        if expected != frame[2] {
            return Err(PluginError::device_error(
                "SHT2x",
                format!("checksum mismatch: got 0x{:02x}, expected 0x{:02x}", frame[2], expected),
            ));
        }
        Ok(u16::from_be_bytes([frame[0], frame[1]]))
    }
}

impl<I2C, D> ClimateSensor for Sht2x<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn model(&self) -> SensorModel {
        SensorModel::Sht2x
    }

    fn temperature(&mut self) -> Result<f64> {
        let raw = self.measure(CMD_TRIGGER_T_NO_HOLD, TEMPERATURE_CONVERSION_MS)?;
        Ok(temperature_from_raw(raw))
    }

    fn humidity(&mut self) -> Result<f64> {
        let raw = self.measure(CMD_TRIGGER_RH_NO_HOLD, HUMIDITY_CONVERSION_MS)?;
        Ok(humidity_from_raw(raw))
    }
}
