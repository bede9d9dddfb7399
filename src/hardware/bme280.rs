//! Bosch BME280 temperature, pressure and humidity sensor.

use super::bus::RegisterBus;
use super::{ClimateSensor, SensorModel};
use crate::error::{PluginError, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// Default slave address (SDO pulled high).
pub const BME280_ADDRESS: u8 = 0x77;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_H1: u8 = 0xA1;
const REG_CALIB_26: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

const CHIP_ID: u8 = 0x60;
/// Humidity oversampling x1.
const CTRL_HUM_OSRS_X1: u8 = 0x01;
/// Temperature and pressure oversampling x1, forced mode.
const CTRL_MEAS_FORCED: u8 = 0b001_001_01;
const CTRL_MEAS_SLEEP: u8 = 0x00;
/// Set while a conversion is running.
const STATUS_MEASURING: u8 = 0x08;
/// Worst-case conversion time with every channel at x1 oversampling.
const MAX_MEASUREMENT_US: u32 = 9_300;
const STATUS_POLL_US: u32 = 1_000;
const STATUS_POLLS: u32 = 20;
/// Value reported for a channel whose measurement was skipped.
const ADC_SKIPPED_20: u32 = 0x80000;
const ADC_SKIPPED_16: u32 = 0x8000;

/// Factory trimming parameters read from the chip's NVM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub p: [f64; 9],
    pub h1: f64,
    pub h2: f64,
    pub h3: f64,
    pub h4: f64,
    pub h5: f64,
    pub h6: f64,
}

impl Calibration {
    /// Decode the 0x88..0x9F block, the 0xA1 byte and the 0xE1..0xE7 block.
    pub fn parse(tp: &[u8; 24], h1: u8, h: &[u8; 7]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]) as f64;
        let i16_at = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]) as f64;

        let mut p = [0.0; 9];
        p[0] = u16_at(6);
        for (n, slot) in p.iter_mut().enumerate().skip(1) {
            *slot = i16_at(6 + 2 * n);
        }

        // H4 and H5 are 12-bit values sharing the nibbles of 0xE5.
        let h4 = ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16;
        let h5 = ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16;

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p,
            h1: h1 as f64,
            h2: i16::from_le_bytes([h[0], h[1]]) as f64,
            h3: h[2] as f64,
            h4: h4 as f64,
            h5: h5 as f64,
            h6: h[6] as i8 as f64,
        }
    }

    /// Returns `(celsius, t_fine)`; `t_fine` feeds the other two channels.
    pub fn compensate_temperature(&self, adc_t: u32) -> (f64, f64) {
        let adc = adc_t as f64;
        let var1 = (adc / 16384.0 - self.t1 / 1024.0) * self.t2;
        let var2 = (adc / 131072.0 - self.t1 / 8192.0).powi(2) * self.t3;
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in pascal.
    pub fn compensate_pressure(&self, adc_p: u32, t_fine: f64) -> Option<f64> {
        let p = &self.p;
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * p[5] / 32768.0;
        var2 += var1 * p[4] * 2.0;
        var2 = var2 / 4.0 + p[3] * 65536.0;
        var1 = (p[2] * var1 * var1 / 524288.0 + p[1] * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * p[0];
        if var1 == 0.0 {
            return None;
        }
        let mut pressure = 1048576.0 - adc_p as f64;
        pressure = (pressure - var2 / 4096.0) * 6250.0 / var1;
        var1 = p[8] * pressure * pressure / 2147483648.0;
        var2 = pressure * p[7] / 32768.0;
        Some(pressure + (var1 + var2 + p[6]) / 16.0)
    }

    /// Relative humidity in percent, clamped to 0..=100.
    pub fn compensate_humidity(&self, adc_h: u32, t_fine: f64) -> f64 {
        let mut h = t_fine - 76800.0;
        h = (adc_h as f64 - (self.h4 * 64.0 + self.h5 / 16384.0 * h))
            * (self.h2 / 65536.0
                * (1.0 + self.h6 / 67108864.0 * h * (1.0 + self.h3 / 67108864.0 * h)));
        h *= 1.0 - self.h1 * h / 524288.0;
        h.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct RawSample {
    adc_p: u32,
    adc_t: u32,
    adc_h: u32,
}

impl RawSample {
    fn parse(data: &[u8; 8]) -> Self {
        let adc20 = |msb: u8, lsb: u8, xlsb: u8| {
            ((msb as u32) << 12) | ((lsb as u32) << 4) | ((xlsb as u32) >> 4)
        };
        Self {
            adc_p: adc20(data[0], data[1], data[2]),
            adc_t: adc20(data[3], data[4], data[5]),
            adc_h: ((data[6] as u32) << 8) | data[7] as u32,
        }
    }
}

/// BME280 driver. Binding triggers one forced conversion; every channel
/// read afterwards comes from that conversion.
pub struct Bme280<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    calibration: Calibration,
}

impl<I2C: I2c, D: DelayNs> Bme280<I2C, D> {
    /// Probe the default address, load calibration and take a measurement.
    pub fn new(i2c: I2C, delay: D) -> Result<Self> {
        Self::with_address(i2c, delay, BME280_ADDRESS)
    }

    pub fn with_address(mut i2c: I2C, delay: D, address: u8) -> Result<Self> {
        let chip_id = i2c.read_register(address, REG_CHIP_ID)?;
        if chip_id != CHIP_ID {
            return Err(PluginError::device_error(
                "BME280",
                format!("unexpected chip id 0x{:02x}", chip_id),
            ));
        }

        let mut tp = [0u8; 24];
        i2c.read_registers(address, REG_CALIB_00, &mut tp)?;
        let h1 = i2c.read_register(address, REG_CALIB_H1)?;
        let mut h = [0u8; 7];
        i2c.read_registers(address, REG_CALIB_26, &mut h)?;

        // ctrl_hum only takes effect after the following ctrl_meas write.
        i2c.write_register(address, REG_CTRL_HUM, CTRL_HUM_OSRS_X1)?;

        let mut sensor = Self {
            i2c,
            delay,
            address,
            calibration: Calibration::parse(&tp, h1, &h),
        };
        sensor.measure()?;
        Ok(sensor)
    }

    /// Start a forced conversion and block until its results are latched.
    fn measure(&mut self) -> Result<()> {
        self.i2c
            .write_register(self.address, REG_CTRL_MEAS, CTRL_MEAS_FORCED)?;
        self.delay.delay_us(MAX_MEASUREMENT_US);

        for _ in 0..STATUS_POLLS {
            let status = self.i2c.read_register(self.address, REG_STATUS)?;
            if status & STATUS_MEASURING == 0 {
                return Ok(());
            }
            self.delay.delay_us(STATUS_POLL_US);
        }
        Err(PluginError::device_error("BME280", "conversion did not finish"))
    }

    fn sample(&mut self) -> Result<RawSample> {
        let mut data = [0u8; 8];
        self.i2c.read_registers(self.address, REG_DATA, &mut data)?;
        Ok(RawSample::parse(&data))
    }

    fn t_fine(&self, sample: &RawSample) -> Result<(f64, f64)> {
        if sample.adc_t == ADC_SKIPPED_20 {
            return Err(PluginError::device_error("BME280", "temperature measurement skipped"));
        }
        Ok(self.calibration.compensate_temperature(sample.adc_t))
    }

    fn read_pressure(&mut self) -> Result<f64> {
        let sample = self.sample()?;
        let (_, t_fine) = self.t_fine(&sample)?;
        if sample.adc_p == ADC_SKIPPED_20 {
            return Err(PluginError::device_error("BME280", "pressure measurement skipped"));
        }
        self.calibration
            .compensate_pressure(sample.adc_p, t_fine)
            .ok_or_else(|| PluginError::device_error("BME280", "invalid pressure calibration"))
    }
}

impl<I2C, D> ClimateSensor for Bme280<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn model(&self) -> SensorModel {
        SensorModel::Bme280
    }

    fn temperature(&mut self) -> Result<f64> {
        let sample = self.sample()?;
        Ok(self.t_fine(&sample)?.0)
    }

    fn humidity(&mut self) -> Result<f64> {
        let sample = self.sample()?;
        let (_, t_fine) = self.t_fine(&sample)?;
        if sample.adc_h == ADC_SKIPPED_16 {
            return Err(PluginError::device_error("BME280", "humidity measurement skipped"));
        }
        Ok(self.calibration.compensate_humidity(sample.adc_h, t_fine))
    }

    fn pressure(&mut self) -> Option<Result<f64>> {
        Some(self.read_pressure())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.i2c
            .write_register(self.address, REG_CTRL_MEAS, CTRL_MEAS_SLEEP)
    }
}
