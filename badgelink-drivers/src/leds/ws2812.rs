//! WS2812 LED strip
//!
//! Holds the frame buffer and turns each pixel into the 24-bit word that
//! goes out on the wire (GRB, most significant bit first, brightness
//! corrected). Bit timing belongs to whatever peripheral drives the strip.

use badgelink_core::traits::PeripheralError;
use badgelink_protocol::Rgb;

/// Data bits per pixel
pub const BITS_PER_PIXEL: usize = 24;

/// Minimum low time between frames, in microseconds
pub const RESET_US: u64 = 50;

/// Per-channel brightness correction in GRB order, as `NUM / DEN`
///
/// Scales the strip to 30% and balances the white point.
const CORRECTION_NUM: [u32; 3] = [3 * 177, 3 * 256, 3 * 241];
const CORRECTION_DEN: u32 = 10 * 256;

/// Frame buffer for an `N`-pixel strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedStrip<const N: usize> {
    pixels: [Rgb; N],
    dirty: bool,
}

impl<const N: usize> Default for LedStrip<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LedStrip<N> {
    /// All pixels off; the first frame is marked dirty so the strip gets
    /// cleared at boot
    pub const fn new() -> Self {
        Self {
            pixels: [Rgb::OFF; N],
            dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn pixel(&self, index: usize) -> Option<Rgb> {
        self.pixels.get(index).copied()
    }

    pub fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<(), PeripheralError> {
        let pixel = self
            .pixels
            .get_mut(index)
            .ok_or(PeripheralError::InvalidId)?;
        if *pixel != color {
            *pixel = color;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether a refresh was pending
    pub fn take_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.dirty, false)
    }

    /// Encode the whole frame, one wire word per pixel
    pub fn encode(&self, out: &mut [u32; N]) {
        for (pixel, word) in self.pixels.iter().zip(out.iter_mut()) {
            *word = encode_pixel(*pixel);
        }
    }
}

/// Apply the brightness correction for one GRB channel
pub fn correct(value: u8, channel: usize) -> u8 {
    let num = CORRECTION_NUM[channel % 3];
    ((value as u32 * num + CORRECTION_DEN / 2) / CORRECTION_DEN) as u8
}

/// Corrected GRB word for one pixel, in the low 24 bits
pub fn encode_pixel(color: Rgb) -> u32 {
    [color.g, color.r, color.b]
        .iter()
        .enumerate()
        .fold(0, |word, (channel, value)| {
            (word << 8) | u32::from(correct(*value, channel))
        })
}

/// Bits of a wire word in transmission order
pub fn wire_bits(word: u32) -> impl Iterator<Item = bool> {
    (0..BITS_PER_PIXEL).rev().map(move |bit| word & (1 << bit) != 0)
}
