//! Board-agnostic core of the badge bridge
//!
//! This crate contains everything between the socket and the pins that does
//! not depend on a specific board:
//!
//! - Capability traits for peripherals and the network transport
//! - The bridge queue pair linking network and hardware
//! - The hardware event loop and the live peripheral state
//! - The websocket connection session and its single-slot acceptor
//! - Configuration types and the embedded config parser
//!
//! Every component is a synchronous state machine stepped with an explicit
//! millisecond timestamp, so the whole crate runs under host tests.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod hardware;
pub mod session;
pub mod traits;

pub use bridge::{Bridge, HardwarePort, NetworkPort, QueueFull, BRIDGE_CAPACITY};
pub use config::{BadgeConfig, BridgeConfig, ConfigError, WifiConfig};
pub use hardware::{HardwareEventLoop, LoopStats, PeripheralState, TickReport};
pub use session::{
    Acceptor, AcceptorPoll, Busy, PollOutcome, Session, SessionError, SessionState, SessionStats,
};
pub use traits::{
    InputSnapshot, PeripheralError, Peripherals, SensorSample, Transport, TransportError,
};

/// Milliseconds elapsed from `since` to `now` on a wrapping 32-bit clock
pub(crate) fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
