//! Hardware driver implementations
//!
//! Concrete implementations of the badgelink-core capability traits for
//! the badge hardware:
//!
//! - Debounced button bank over GPIO inputs
//! - WS2812 LED strip frame buffer and wire word encoding
//! - LIS2DH12 accelerometer / temperature sensor over async I2C
//! - [`Badge`](badge::Badge), the aggregate the hardware event loop drives

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod badge;
pub mod buttons;
pub mod leds;
pub mod sensor;

pub use badge::Badge;
pub use buttons::ButtonBank;
pub use leds::ws2812::LedStrip;
pub use sensor::lis2dh12::Lis2dh12;
