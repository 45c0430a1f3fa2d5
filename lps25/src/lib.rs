#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

//! Driver for the ST LPS25 barometric pressure sensor, speaking raw
//! registers over any [`embedded_hal::i2c::I2c`] bus.

use embedded_hal::i2c::I2c;

/// SA0 pulled high (the Adafruit breakout default). With SA0 low the
/// sensor answers on 0x5C instead.
pub const DEFAULT_ADDRESS: u8 = 0x5D;

const CTRL_REG1: u8 = 0x20;
const PD_BIT: u8 = 7;
const ODR_MASK: u8 = 0b0111_0000;
const ODR_SHIFT: u8 = 4;

const CTRL_REG2: u8 = 0x21;
const SWRESET_BIT: u8 = 2;

const PRESS_OUT_XL: u8 = 0x28;
// MSB of the register address enables address auto-increment, needed to
// read the three pressure bytes in one transfer
const AUTO_INCREMENT: u8 = 0x80;

/// Output data rate, the ODR2..ODR0 bits of CTRL_REG1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataRate {
    /// Default after power-up; a measurement must be triggered manually
    OneShot = 0b000,
    Hz1 = 0b001,
    Hz7 = 0b010,
    Hz12_5 = 0b011,
    Hz25 = 0b100,
}

pub struct Lps25<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Lps25<I2C> {
    /// Sensor at the default I²C address.
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give the bus back, e.g. to hand it to another device.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_register(&mut self, register: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[register], &mut buf)?;
        Ok(buf[0])
    }

    /// Read-modify-write, so unrelated bits of the register survive.
    fn update_register(
        &mut self,
        register: u8,
        patch: impl FnOnce(u8) -> u8,
    ) -> Result<(), I2C::Error> {
        let current = self.read_register(register)?;
        self.i2c.write(self.address, &[register, patch(current)])
    }

    /// Whether the sensor is powered up (PD bit of CTRL_REG1).
    pub fn is_enabled(&mut self) -> Result<bool, I2C::Error> {
        Ok(self.read_register(CTRL_REG1)? & (1 << PD_BIT) != 0)
    }

    pub fn enable(&mut self) -> Result<(), I2C::Error> {
        self.update_register(CTRL_REG1, |reg| reg | 1 << PD_BIT)
    }

    pub fn disable(&mut self) -> Result<(), I2C::Error> {
        self.update_register(CTRL_REG1, |reg| reg & !(1 << PD_BIT))
    }

    /// Software reset; the sensor reloads the calibration values stored in
    /// its trim registers.
    pub fn reset(&mut self) -> Result<(), I2C::Error> {
        self.update_register(CTRL_REG2, |reg| reg | 1 << SWRESET_BIT)
    }

    pub fn set_data_rate(&mut self, rate: DataRate) -> Result<(), I2C::Error> {
        self.update_register(CTRL_REG1, |reg| {
            (reg & !ODR_MASK) | ((rate as u8) << ODR_SHIFT)
        })
    }

    /// Current pressure in hPa.
    pub fn pressure(&mut self) -> Result<f32, I2C::Error> {
        let mut data = [0u8; 3];
        self.i2c
            .write_read(self.address, &[PRESS_OUT_XL | AUTO_INCREMENT], &mut data)?;

        let raw = u32::from(data[2]) << 16 | u32::from(data[1]) << 8 | u32::from(data[0]);

        Ok(raw as f32 / 4096.0)
    }
}
