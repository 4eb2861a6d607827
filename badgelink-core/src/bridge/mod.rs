//! Bridge queue between the connection session and the hardware event loop

pub mod queue;

pub use queue::{
    Bridge, Drain, HardwarePort, NetworkPort, QueueFull, Receiver, Sender, BRIDGE_CAPACITY,
};
