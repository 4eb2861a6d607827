//! Badge peripheral aggregate
//!
//! Implements [`Peripherals`] for the event loop. LED writes land in the
//! strip's frame buffer; the firmware pushes a dirty frame out over RMT
//! after each tick. Sensor samples are read asynchronously by the firmware
//! and parked here until the event loop asks for one.

use badgelink_core::traits::{InputSnapshot, PeripheralError, Peripherals, SensorSample, LED_COUNT};
use badgelink_protocol::Rgb;
use embedded_hal::digital::InputPin;

use crate::buttons::ButtonBank;
use crate::leds::ws2812::LedStrip;

/// Buttons, LED strip and the latest sensor sample
pub struct Badge<P, const B: usize> {
    buttons: ButtonBank<P, B>,
    strip: LedStrip<LED_COUNT>,
    sample: Option<SensorSample>,
}

impl<P: InputPin, const B: usize> Badge<P, B> {
    pub fn new(buttons: ButtonBank<P, B>) -> Self {
        Self {
            buttons,
            strip: LedStrip::new(),
            sample: None,
        }
    }

    pub fn buttons(&self) -> &ButtonBank<P, B> {
        &self.buttons
    }

    pub fn strip(&self) -> &LedStrip<LED_COUNT> {
        &self.strip
    }

    pub fn strip_mut(&mut self) -> &mut LedStrip<LED_COUNT> {
        &mut self.strip
    }

    /// Park a fresh sensor sample, replacing one not yet consumed
    pub fn store_sample(&mut self, sample: SensorSample) {
        self.sample = Some(sample);
    }
}

impl<P: InputPin, const B: usize> Peripherals for Badge<P, B> {
    fn read_inputs(&mut self) -> InputSnapshot {
        self.buttons.sample()
    }

    fn write_output(&mut self, id: u8, color: Rgb) -> Result<(), PeripheralError> {
        self.strip.set_pixel(id as usize, color)
    }

    fn sample_sensors(&mut self) -> Option<SensorSample> {
        self.sample.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use badgelink_core::bridge::Bridge;
    use badgelink_core::config::BridgeConfig;
    use badgelink_core::hardware::HardwareEventLoop;
    use badgelink_protocol::ApplicationMessage;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    struct HeldPin(bool);

    impl ErrorType for HeldPin {
        type Error = Infallible;
    }

    impl InputPin for HeldPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }
    }

    fn badge(held: [bool; 2]) -> Badge<HeldPin, 2> {
        Badge::new(ButtonBank::with_debounce(held.map(HeldPin), 1))
    }

    #[test]
    fn test_write_output_updates_strip() {
        let mut badge = badge([false, false]);
        badge.strip_mut().take_dirty();

        badge.write_output(15, Rgb::new(4, 5, 6)).unwrap();
        assert_eq!(badge.strip().pixel(15), Some(Rgb::new(4, 5, 6)));
        assert!(badge.strip().is_dirty());
        assert_eq!(
            badge.write_output(16, Rgb::new(1, 1, 1)),
            Err(PeripheralError::InvalidId)
        );
    }

    #[test]
    fn test_sample_is_consumed_once() {
        let mut badge = badge([false, false]);
        let sample = SensorSample {
            accel_mg: [0, 0, 1000],
            temperature_centi: None,
        };

        badge.store_sample(sample);
        assert_eq!(badge.sample_sensors(), Some(sample));
        assert_eq!(badge.sample_sensors(), None);
    }

    #[test]
    fn test_event_loop_drives_badge() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let config = BridgeConfig::default();
        let mut event_loop = HardwareEventLoop::new(&config);
        let mut badge = badge([false, true]);

        net.inbound
            .try_send(ApplicationMessage::LedCommand {
                id: 2,
                color: Rgb::new(0, 0, 9),
            })
            .unwrap();
        event_loop.tick(0, &mut badge, &mut hw);

        assert_eq!(badge.strip().pixel(2), Some(Rgb::new(0, 0, 9)));
        assert_eq!(
            net.outbound.try_recv(),
            Some(ApplicationMessage::ButtonEvent {
                id: 1,
                pressed: true
            })
        );
    }
}
