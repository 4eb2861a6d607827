//! Non-blocking byte stream under a session

/// Transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Peer closed the connection
    Closed,
    /// Connection reset
    Reset,
    /// Any other I/O failure
    Io,
}

/// A connected socket polled without blocking
///
/// Both calls return `Ok(0)` when no progress is possible right now. End of
/// stream is reported as [`TransportError::Closed`], never as `Ok(0)`.
pub trait Transport {
    /// Read whatever bytes are available into `buf`
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Queue as many bytes of `buf` as possible for sending
    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;
}
