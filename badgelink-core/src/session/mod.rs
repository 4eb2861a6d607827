//! Websocket session handling
//!
//! A [`Session`] drives one connection through the upgrade handshake and
//! framing. The [`Acceptor`] owns the single session slot.

pub mod acceptor;
pub mod connection;
pub mod state;

#[cfg(test)]
pub(crate) mod mock;

pub use acceptor::{Acceptor, AcceptorPoll, Busy};
pub use connection::{
    PollOutcome, Session, SessionError, SessionStats, RX_BUFFER_SIZE, TX_BUFFER_SIZE,
};
pub use state::{SessionEvent, SessionState};
