//! Debounced button bank
//!
//! Buttons are wired active-low: the pin reads low while the button is
//! held. A button only changes state after reading the same raw level for
//! `debounce_samples` consecutive samples.

use badgelink_core::traits::{InputSnapshot, BUTTON_COUNT};
use embedded_hal::digital::InputPin;

/// Default consecutive samples required to accept a level change
pub const DEFAULT_DEBOUNCE_SAMPLES: u8 = 2;

/// Up to [`BUTTON_COUNT`] buttons sampled together
pub struct ButtonBank<P, const N: usize> {
    pins: [P; N],
    /// Debounced pressed bitmap
    stable: u16,
    /// Consecutive samples disagreeing with `stable`, per button
    pending: [u8; N],
    debounce_samples: u8,
    read_errors: u32,
}

impl<P: InputPin, const N: usize> ButtonBank<P, N> {
    const FITS: () = assert!(N <= BUTTON_COUNT);

    pub fn new(pins: [P; N]) -> Self {
        Self::with_debounce(pins, DEFAULT_DEBOUNCE_SAMPLES)
    }

    /// Create a bank requiring `samples` stable reads per change (minimum 1)
    pub fn with_debounce(pins: [P; N], samples: u8) -> Self {
        let _ = Self::FITS;
        Self {
            pins,
            stable: 0,
            pending: [0; N],
            debounce_samples: samples.max(1),
            read_errors: 0,
        }
    }

    /// Pin reads that failed since boot
    pub fn read_errors(&self) -> u32 {
        self.read_errors
    }

    /// Current debounced state without sampling
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            buttons: self.stable,
        }
    }

    /// Sample every pin once and return the debounced state
    ///
    /// A pin that fails to read keeps its previous state.
    pub fn sample(&mut self) -> InputSnapshot {
        for (index, pin) in self.pins.iter_mut().enumerate() {
            let bit = 1u16 << index;
            let pressed = match pin.is_low() {
                Ok(low) => low,
                Err(_) => {
                    self.read_errors = self.read_errors.wrapping_add(1);
                    self.pending[index] = 0;
                    continue;
                }
            };

            if pressed == (self.stable & bit != 0) {
                self.pending[index] = 0;
                continue;
            }

            self.pending[index] += 1;
            if self.pending[index] >= self.debounce_samples {
                self.stable ^= bit;
                self.pending[index] = 0;
            }
        }
        self.snapshot()
    }
}
