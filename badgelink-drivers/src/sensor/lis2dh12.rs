//! LIS2DH12 accelerometer
//!
//! Three-axis accelerometer with an auxiliary temperature sensor, on I2C
//! at 0x19 on the badge. Runs in normal (10-bit) mode at 400 Hz, ±16 g full
//! scale, with block data update so the high and low bytes of a sample
//! always belong together.

use badgelink_core::traits::SensorSample;
use embedded_hal::i2c::{Error as _, ErrorKind};
use embedded_hal_async::i2c::I2c;

/// Bus address with SA0 pulled high
pub const DEFAULT_ADDRESS: u8 = 0x19;

/// Expected `WHO_AM_I` value
pub const DEVICE_ID: u8 = 0x33;

/// Milli-g per digit at ±16 g in normal mode
pub const SENSITIVITY_MG: i32 = 48;

/// Auxiliary temperature sensor offset, in hundredths of a degree
///
/// The sensor reports a delta; 20 °C puts the badge's reading close to
/// the room temperature.
pub const TEMPERATURE_OFFSET_CENTI: i32 = 2_000;

mod reg {
    pub const OUT_TEMP_L: u8 = 0x0C;
    pub const WHO_AM_I: u8 = 0x0F;
    pub const TEMP_CFG: u8 = 0x1F;
    pub const CTRL_REG1: u8 = 0x20;
    pub const CTRL_REG4: u8 = 0x23;
    pub const CTRL_REG5: u8 = 0x24;
    pub const OUT_X_L: u8 = 0x28;

    /// Sub-address bit enabling auto-increment on multi-byte reads
    pub const AUTO_INCREMENT: u8 = 0x80;

    /// ODR 400 Hz, normal mode, X/Y/Z enabled
    pub const CTRL_REG1_400HZ_XYZ: u8 = 0b0111_0111;
    /// Block data update, ±16 g
    pub const CTRL_REG4_BDU_16G: u8 = 0b1011_0000;
    /// Reboot memory content
    pub const CTRL_REG5_BOOT: u8 = 0b1000_0000;
    /// Temperature sensor enabled
    pub const TEMP_CFG_ENABLE: u8 = 0b1100_0000;
}

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lis2dh12Error {
    /// I2C transfer failed
    Bus(ErrorKind),
    /// Something else answered at the address
    WrongDevice(u8),
}

/// LIS2DH12 over an async I2C bus
pub struct Lis2dh12<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Lis2dh12<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Release the bus
    pub fn release(self) -> I {
        self.i2c
    }

    /// Verify the device, reboot it and apply the badge configuration
    pub async fn init(&mut self) -> Result<(), Lis2dh12Error> {
        let id = self.read_register(reg::WHO_AM_I).await?;
        if id != DEVICE_ID {
            return Err(Lis2dh12Error::WrongDevice(id));
        }

        self.write_register(reg::CTRL_REG5, reg::CTRL_REG5_BOOT).await?;
        self.write_register(reg::CTRL_REG1, reg::CTRL_REG1_400HZ_XYZ)
            .await?;
        self.write_register(reg::CTRL_REG4, reg::CTRL_REG4_BDU_16G)
            .await?;
        self.write_register(reg::TEMP_CFG, reg::TEMP_CFG_ENABLE).await?;
        Ok(())
    }

    /// Acceleration per axis in milli-g
    pub async fn read_accel_mg(&mut self) -> Result<[i32; 3], Lis2dh12Error> {
        let mut raw = [0u8; 6];
        self.read_block(reg::OUT_X_L, &mut raw).await?;
        Ok(accel_mg(&raw))
    }

    /// Temperature in hundredths of a degree Celsius
    pub async fn read_temperature_centi(&mut self) -> Result<i32, Lis2dh12Error> {
        let mut raw = [0u8; 2];
        self.read_block(reg::OUT_TEMP_L, &mut raw).await?;
        Ok(temperature_centi(raw))
    }

    /// Acceleration plus temperature
    ///
    /// A failed temperature read still yields the acceleration.
    pub async fn sample(&mut self) -> Result<SensorSample, Lis2dh12Error> {
        let accel_mg = self.read_accel_mg().await?;
        let temperature_centi = self.read_temperature_centi().await.ok();
        Ok(SensorSample {
            accel_mg,
            temperature_centi,
        })
    }

    async fn read_register(&mut self, register: u8) -> Result<u8, Lis2dh12Error> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .await
            .map_err(|e| Lis2dh12Error::Bus(e.kind()))?;
        Ok(value[0])
    }

    async fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Lis2dh12Error> {
        self.i2c
            .write_read(self.address, &[register | reg::AUTO_INCREMENT], buf)
            .await
            .map_err(|e| Lis2dh12Error::Bus(e.kind()))
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), Lis2dh12Error> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(|e| Lis2dh12Error::Bus(e.kind()))
    }
}

/// Convert `OUT_X_L..OUT_Z_H` to milli-g
///
/// Samples are 10-bit left-justified two's complement.
pub fn accel_mg(raw: &[u8; 6]) -> [i32; 3] {
    let axis = |lo: u8, hi: u8| (i16::from_le_bytes([lo, hi]) >> 6) as i32 * SENSITIVITY_MG;
    [
        axis(raw[0], raw[1]),
        axis(raw[2], raw[3]),
        axis(raw[4], raw[5]),
    ]
}

/// Convert `OUT_TEMP_L/H` to hundredths of a degree Celsius
///
/// The reading is a delta in 1/256 °C steps.
pub fn temperature_centi(raw: [u8; 2]) -> i32 {
    i16::from_le_bytes(raw) as i32 * 100 / 256 + TEMPERATURE_OFFSET_CENTI
}
