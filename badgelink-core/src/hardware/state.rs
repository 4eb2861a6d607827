//! Live peripheral snapshot
//!
//! Owned by the event loop. Everything that leaves it is copied into a
//! message first.

use badgelink_protocol::Rgb;

use crate::traits::{InputSnapshot, LED_COUNT};

/// Current button bitmap and LED table
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralState {
    inputs: InputSnapshot,
    leds: [Rgb; LED_COUNT],
}

impl Default for PeripheralState {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralState {
    pub const fn new() -> Self {
        Self {
            inputs: InputSnapshot { buttons: 0 },
            leds: [Rgb::OFF; LED_COUNT],
        }
    }

    pub fn inputs(&self) -> InputSnapshot {
        self.inputs
    }

    /// Store a new input sample and return the bitmap of changed buttons
    pub fn update_inputs(&mut self, snapshot: InputSnapshot) -> u16 {
        let changed = snapshot.changed_since(&self.inputs);
        self.inputs = snapshot;
        changed
    }

    pub fn led(&self, id: u8) -> Option<Rgb> {
        self.leds.get(id as usize).copied()
    }

    /// Record a color that was successfully written to the strip
    pub fn set_led(&mut self, id: u8, color: Rgb) {
        if let Some(slot) = self.leds.get_mut(id as usize) {
            *slot = color;
        }
    }

    pub fn leds(&self) -> &[Rgb; LED_COUNT] {
        &self.leds
    }
}
