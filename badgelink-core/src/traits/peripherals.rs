//! Peripheral capability trait

use badgelink_protocol::Rgb;

/// Number of addressable LEDs on the badge strip
pub const LED_COUNT: usize = 16;

/// Upper bound on buttons (one bit each in [`InputSnapshot`])
pub const BUTTON_COUNT: usize = 16;

/// Errors reported by a peripheral write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralError {
    /// No output with this id
    InvalidId,
    /// Bus or driver failure
    Bus,
    /// Peripheral not initialized yet
    NotReady,
}

/// Digital input state sampled in one read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputSnapshot {
    /// Bit n set while button n is pressed
    pub buttons: u16,
}

impl InputSnapshot {
    pub fn is_pressed(&self, id: u8) -> bool {
        (id as usize) < BUTTON_COUNT && self.buttons & (1 << id) != 0
    }

    /// Bitmap of buttons that differ from `previous`
    pub fn changed_since(&self, previous: &InputSnapshot) -> u16 {
        self.buttons ^ previous.buttons
    }
}

/// One sample of the motion/temperature sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSample {
    /// Acceleration per axis in milli-g
    pub accel_mg: [i32; 3],
    /// Temperature in hundredths of a degree Celsius, if available
    pub temperature_centi: Option<i32>,
}

/// Badge hardware as seen by the event loop
///
/// Implementations own the drivers; the event loop is the only caller.
pub trait Peripherals {
    /// Sample all digital inputs
    fn read_inputs(&mut self) -> InputSnapshot;

    /// Set one LED
    fn write_output(&mut self, id: u8, color: Rgb) -> Result<(), PeripheralError>;

    /// Latest sensor sample, if one is ready
    ///
    /// Must not block. Returns `None` when no new sample is available.
    fn sample_sensors(&mut self) -> Option<SensorSample> {
        None
    }
}
