//! Connection lifecycle
//!
//! `Handshaking → Open → Closing → Closed`. `Closed` is terminal; the slot
//! is freed once a session reaches it.

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Waiting for the HTTP upgrade request
    Handshaking,
    /// Upgrade done, frames flowing both ways
    Open,
    /// Close frame exchange in progress
    Closing,
    /// Connection finished
    Closed,
}

/// Inputs to the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    /// 101 response queued
    Upgraded,
    /// Upgrade request rejected
    HandshakeFailed,
    /// Peer sent a close frame
    CloseReceived,
    /// We started the close (protocol error or unsupported data)
    CloseInitiated,
    /// Close frames exchanged in both directions
    CloseCompleted,
    /// Handshake, idle or close timeout elapsed
    TimedOut,
    /// Transport failed or buffers overflowed
    Fault,
}

impl SessionState {
    /// True while frames may be exchanged
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: SessionEvent) -> Self {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (Handshaking, Upgraded) => Open,
            (Handshaking, HandshakeFailed | TimedOut | Fault) => Closed,

            // Idle timeout and write errors still pass through Closing
            (Open, CloseReceived | CloseInitiated | TimedOut | Fault) => Closing,

            (Closing, CloseCompleted | TimedOut | Fault) => Closed,

            // Default: stay in current state
            _ => self,
        }
    }
}
