//! Non-blocking transport over an embassy-net TCP socket
//!
//! The session is polled, never awaited, so reads and writes are attempted
//! once and report `Ok(0)` when the socket is not ready.

use core::task::Poll;

use embassy_futures::poll_once;
use embassy_net::tcp::{Error as TcpError, TcpSocket};

use badgelink_core::{Transport, TransportError};

/// Owns the accepted socket for the lifetime of a session
pub struct TcpTransport {
    socket: TcpSocket<'static>,
}

impl TcpTransport {
    pub fn new(socket: TcpSocket<'static>) -> Self {
        Self { socket }
    }

    /// Return the socket so it can listen again
    pub fn into_socket(self) -> TcpSocket<'static> {
        self.socket
    }
}

fn map_error(error: TcpError) -> TransportError {
    match error {
        TcpError::ConnectionReset => TransportError::Reset,
    }
}

impl Transport for TcpTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.socket.can_recv() {
            if !self.socket.may_recv() {
                return Err(TransportError::Closed);
            }
            return Ok(0);
        }

        match poll_once(self.socket.read(buf)) {
            Poll::Ready(Ok(0)) => Err(TransportError::Closed),
            Poll::Ready(Ok(n)) => Ok(n),
            Poll::Ready(Err(e)) => Err(map_error(e)),
            Poll::Pending => Ok(0),
        }
    }

    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        if !self.socket.may_send() {
            return Err(TransportError::Closed);
        }
        if !self.socket.can_send() {
            return Ok(0);
        }

        match poll_once(self.socket.write(buf)) {
            Poll::Ready(Ok(n)) => Ok(n),
            Poll::Ready(Err(e)) => Err(map_error(e)),
            Poll::Pending => Ok(0),
        }
    }
}
