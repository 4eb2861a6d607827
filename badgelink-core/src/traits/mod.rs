//! Capability traits
//!
//! These traits define the interface between the core state machines and
//! board-specific implementations.

pub mod peripherals;
pub mod transport;

pub use peripherals::{
    InputSnapshot, PeripheralError, Peripherals, SensorSample, BUTTON_COUNT, LED_COUNT,
};
pub use transport::{Transport, TransportError};
