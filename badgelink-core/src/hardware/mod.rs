//! Hardware side of the bridge

pub mod event_loop;
pub mod state;

pub use event_loop::{HardwareEventLoop, LoopStats, TickReport};
pub use state::PeripheralState;
