//! TAOS/AMS TSL2561 light-to-digital converter.
//!
//! Channel 0 sees visible and infrared light ("broadband"), channel 1 only
//! infrared. Lux is derived with the integer approximation from the
//! datasheet for the T/FN/CL package.

use super::bus::RegisterBus;
use super::{LightSensor, SensorModel};
use crate::error::{PluginError, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use std::time::{Duration, Instant};

/// Slave address with the ADDR SEL pin grounded.
pub const TSL2561_ADDRESS: u8 = 0x29;

const COMMAND_BIT: u8 = 0x80;
const WORD_BIT: u8 = 0x20;

const REG_CONTROL: u8 = 0x00;
const REG_TIMING: u8 = 0x01;
const REG_DATA0: u8 = 0x0C;
const REG_DATA1: u8 = 0x0E;

const POWER_ON: u8 = 0x03;
const POWER_OFF: u8 = 0x00;
const GAIN_16X_BIT: u8 = 0x10;

const LUX_SCALE: u32 = 14;
const RATIO_SCALE: u32 = 9;
const CH_SCALE: u32 = 10;
const CHSCALE_TINT0: u32 = 0x7517;
const CHSCALE_TINT1: u32 = 0x0FE7;

/// Lux reported once either channel saturates.
pub const SATURATED_LUX: u32 = 65536;

/// `(ratio upper bound, B coefficient, M coefficient)` segments.
const SEGMENTS: [(u32, u32, u32); 8] = [
    (0x0040, 0x01F2, 0x01BE),
    (0x0080, 0x0214, 0x02D1),
    (0x00C0, 0x023F, 0x037B),
    (0x0100, 0x0270, 0x03FE),
    (0x0138, 0x016F, 0x01FC),
    (0x019A, 0x00D2, 0x00FB),
    (0x029A, 0x0018, 0x0012),
    (u32::MAX, 0x0000, 0x0000),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    X1,
    X16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationTime {
    Ms13,
    Ms101,
    Ms402,
}

impl IntegrationTime {
    fn timing_bits(self) -> u8 {
        match self {
            Self::Ms13 => 0x00,
            Self::Ms101 => 0x01,
            Self::Ms402 => 0x02,
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            Self::Ms13 => Duration::from_millis(14),
            Self::Ms101 => Duration::from_millis(102),
            Self::Ms402 => Duration::from_millis(403),
        }
    }

    /// Channel counts above this are treated as saturated.
    fn clip_threshold(self) -> u16 {
        match self {
            Self::Ms13 => 4900,
            Self::Ms101 => 37000,
            Self::Ms402 => 65000,
        }
    }

    fn channel_scale(self) -> u32 {
        match self {
            Self::Ms13 => CHSCALE_TINT0,
            Self::Ms101 => CHSCALE_TINT1,
            Self::Ms402 => 1 << CH_SCALE,
        }
    }
}

/// Datasheet lux approximation for the given gain and integration time.
pub fn calculate_lux(gain: Gain, integration: IntegrationTime, broadband: u16, infrared: u16) -> u32 {
    let clip = integration.clip_threshold();
    if broadband > clip || infrared > clip {
        return SATURATED_LUX;
    }

    let mut scale = integration.channel_scale();
    if gain == Gain::X1 {
        scale <<= 4;
    }
    let channel0 = (broadband as u64 * scale as u64) >> CH_SCALE;
    let channel1 = (infrared as u64 * scale as u64) >> CH_SCALE;

    let ratio = if channel0 != 0 {
        (((channel1 << (RATIO_SCALE + 1)) / channel0) + 1) >> 1
    } else {
        0
    };

    let (b, m) = SEGMENTS
        .iter()
        .find(|(bound, _, _)| ratio <= *bound as u64)
        .map(|(_, b, m)| (*b as u64, *m as u64))
        .unwrap_or((0, 0));

    let weighted = (channel0 * b).saturating_sub(channel1 * m);
    ((weighted + (1 << (LUX_SCALE - 1))) >> LUX_SCALE) as u32
}

pub struct Tsl2561<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    gain: Gain,
    integration: IntegrationTime,
    powered_at: Instant,
}

impl<I2C: I2c, D: DelayNs> Tsl2561<I2C, D> {
    /// Power up at the default address with 16x gain and 402 ms integration.
    pub fn new(i2c: I2C, delay: D) -> Result<Self> {
        Self::with_options(i2c, delay, TSL2561_ADDRESS, Gain::X16, IntegrationTime::Ms402)
    }

    pub fn with_options(
        mut i2c: I2C,
        delay: D,
        address: u8,
        gain: Gain,
        integration: IntegrationTime,
    ) -> Result<Self> {
        i2c.write_register(address, COMMAND_BIT | REG_CONTROL, POWER_ON)?;
        let control = i2c.read_register(address, COMMAND_BIT | REG_CONTROL)?;
        if control & POWER_ON != POWER_ON {
            return Err(PluginError::device_error(
                "TSL2561",
                format!("did not power up (control register 0x{:02x})", control),
            ));
        }

        let mut timing = integration.timing_bits();
        if gain == Gain::X16 {
            timing |= GAIN_16X_BIT;
        }
        i2c.write_register(address, COMMAND_BIT | REG_TIMING, timing)?;

        Ok(Self {
            i2c,
            delay,
            address,
            gain,
            integration,
            powered_at: Instant::now(),
        })
    }

    fn read_channel(&mut self, register: u8) -> Result<u16> {
        let mut word = [0u8; 2];
        self.i2c
            .read_registers(self.address, COMMAND_BIT | WORD_BIT | register, &mut word)?;
        Ok(u16::from_le_bytes(word))
    }
}

impl<I2C, D> LightSensor for Tsl2561<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn model(&self) -> SensorModel {
        SensorModel::Tsl2561
    }

    fn luminosity(&mut self) -> Result<(u16, u16)> {
        // The ADC holds zeros until the first integration after power-up completes.
        let remaining = (self.powered_at + self.integration.duration())
            .saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            self.delay
                .delay_us(u32::try_from(remaining.as_micros()).unwrap_or(u32::MAX));
        }

        let broadband = self.read_channel(REG_DATA0)?;
        let infrared = self.read_channel(REG_DATA1)?;
        Ok((broadband, infrared))
    }

    fn lux(&self, broadband: u16, infrared: u16) -> u32 {
        calculate_lux(self.gain, self.integration, broadband, infrared)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.i2c
            .write_register(self.address, COMMAND_BIT | REG_CONTROL, POWER_OFF)
    }
}
