//! Badge board wiring
//!
//! - Buttons: GPIO2-5, active-low
//! - WS2812 strip: GPIO10, RMT channel 0 at 80 MHz
//! - LIS2DH12: I2C0, SDA GPIO6 / SCL GPIO7, address 0x19

use esp_hal::gpio::{interconnect::PeripheralOutput, Input, Level};
use esp_hal::i2c::master::I2c;
use esp_hal::rmt::{
    Channel, ChannelCreator, ConfigError, PulseCode, Tx, TxChannelConfig, TxChannelCreator,
};
use esp_hal::Async;

use badgelink_drivers::leds::ws2812::{self, BITS_PER_PIXEL};
use badgelink_drivers::{Badge, Lis2dh12};

/// RMT source clock; pulse lengths are in ticks of this clock
pub const RMT_CLOCK_MHZ: u32 = 80;

/// LIS2DH12 supports up to 400 kHz
pub const I2C_FREQUENCY_KHZ: u32 = 400;

/// Number of buttons wired on the badge
pub const BUTTONS: usize = 4;

pub type BadgePeripherals = Badge<Input<'static>, BUTTONS>;
pub type Accelerometer = Lis2dh12<I2c<'static, Async>>;
pub type LedChannel = Channel<'static, Async, Tx>;

/// Pulse codes per pixel: the data bits plus the end marker
pub const PULSES_PER_PIXEL: usize = BITS_PER_PIXEL + 1;

// 250 ns high / 1000 ns low and 875 ns high / 375 ns low. Skewed from the
// datasheet timings; this is what the badge's strip latches reliably.
const ZERO: PulseCode = PulseCode::new(Level::High, 20, Level::Low, 80);
const ONE: PulseCode = PulseCode::new(Level::High, 70, Level::Low, 30);

/// Configure an RMT channel for the WS2812 strip
pub fn led_channel(
    creator: ChannelCreator<'static, Async, 0>,
    pin: impl PeripheralOutput<'static>,
) -> Result<LedChannel, ConfigError> {
    creator.configure_tx(
        pin,
        TxChannelConfig::default()
            .with_clk_divider(1)
            .with_idle_output_level(Level::Low)
            .with_idle_output(true)
            .with_carrier_modulation(false),
    )
}

/// RMT pulse codes for one pixel's wire word, ending with the end marker
pub fn rmt_pulses(word: u32) -> [PulseCode; PULSES_PER_PIXEL] {
    let mut pulses = [PulseCode::end_marker(); PULSES_PER_PIXEL];
    for (pulse, bit) in pulses.iter_mut().zip(ws2812::wire_bits(word)) {
        *pulse = if bit { ONE } else { ZERO };
    }
    pulses
}
