//! Reassembly of fragmented data messages
//!
//! A data message is one Text or Binary frame followed by zero or more
//! Continuation frames, the last of which has FIN set. Control frames may be
//! interleaved and pass through untouched.

use heapless::Vec;

use crate::frame::{Frame, FrameError, Opcode, MAX_PAYLOAD_SIZE};

/// Kind of data message being assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataKind {
    Text,
    Binary,
}

/// A complete data message, borrowed from the assembler
#[derive(Debug, PartialEq, Eq)]
pub struct AssembledMessage<'a> {
    pub kind: DataKind,
    pub payload: &'a [u8],
}

/// Joins fragmented frames into complete messages
#[derive(Debug)]
pub struct MessageAssembler {
    kind: Option<DataKind>,
    complete: bool,
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageAssembler {
    pub const fn new() -> Self {
        Self {
            kind: None,
            complete: false,
            buffer: Vec::new(),
        }
    }

    /// True while a fragmented message is waiting for its final frame
    pub fn in_progress(&self) -> bool {
        self.kind.is_some() && !self.complete
    }

    /// Drop any partial message
    pub fn reset(&mut self) {
        self.kind = None;
        self.complete = false;
        self.buffer.clear();
    }

    /// Feed one decoded frame
    ///
    /// Returns the finished message when `frame` completes one. Control
    /// frames return `Ok(None)` and leave a message in progress intact. The
    /// previously returned message is released on the next call.
    pub fn push(&mut self, frame: &Frame) -> Result<Option<AssembledMessage<'_>>, FrameError> {
        if self.complete {
            self.reset();
        }

        let kind = match frame.opcode {
            Opcode::Close | Opcode::Ping | Opcode::Pong => return Ok(None),
            Opcode::Continuation => self.kind.ok_or(FrameError::UnexpectedContinuation)?,
            Opcode::Text | Opcode::Binary => {
                if self.kind.is_some() {
                    return Err(FrameError::UnexpectedMessageStart);
                }
                let kind = if frame.opcode == Opcode::Text {
                    DataKind::Text
                } else {
                    DataKind::Binary
                };
                self.kind = Some(kind);
                kind
            }
        };

        if self.buffer.extend_from_slice(&frame.payload).is_err() {
            self.reset();
            return Err(FrameError::PayloadTooLarge);
        }

        if !frame.fin {
            return Ok(None);
        }

        if kind == DataKind::Text && core::str::from_utf8(&self.buffer).is_err() {
            self.reset();
            return Err(FrameError::InvalidUtf8);
        }

        self.complete = true;
        Ok(Some(AssembledMessage {
            kind,
            payload: &self.buffer,
        }))
    }
}
