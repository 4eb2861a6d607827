//! In-memory transport for session tests

use std::collections::VecDeque;
use std::vec::Vec;

use badgelink_protocol::{Frame, FrameDecoder, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};

use crate::traits::{Transport, TransportError};

pub const UPGRADE_REQUEST: &str = "GET /ws HTTP/1.1\r\n\
    Host: 10.0.0.2\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Sec-WebSocket-Version: 13\r\n\
    \r\n";

const CLIENT_MASK: [u8; 4] = [0xA1, 0xB2, 0xC3, 0xD4];

/// Scripted peer
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Bytes the session will read
    pub incoming: VecDeque<u8>,
    /// Bytes the session wrote
    pub outgoing: Vec<u8>,
    /// Bytes returned per `try_read` call (0 = unlimited)
    pub read_chunk: usize,
    /// Bytes accepted before writes stall (`None` = unlimited)
    pub write_budget: Option<usize>,
    /// Returned by the next read once `incoming` is empty
    pub read_error: Option<TransportError>,
    /// Returned by every write
    pub write_error: Option<TransportError>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    /// Queue a masked client frame
    pub fn push_frame(&mut self, frame: &Frame) {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode_masked(CLIENT_MASK, &mut buffer).unwrap();
        self.push_bytes(&buffer[..len]);
    }

    /// Remove and return the HTTP response head from the written bytes
    pub fn take_response(&mut self) -> String {
        let end = self
            .outgoing
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|pos| pos + 4)
            .expect("no complete HTTP response written");
        let head: Vec<u8> = self.outgoing.drain(..end).collect();
        String::from_utf8(head).unwrap()
    }

    /// Remove and decode every complete server frame written so far
    pub fn take_frames(&mut self) -> Vec<Frame> {
        let decoder = FrameDecoder::client(MAX_PAYLOAD_SIZE);
        let mut frames = Vec::new();
        let mut offset = 0;
        while let (Some(frame), used) = decoder.decode(&self.outgoing[offset..]).unwrap() {
            frames.push(frame);
            offset += used;
        }
        self.outgoing.drain(..offset);
        frames
    }
}

impl Transport for MockTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.incoming.is_empty() {
            return match self.read_error {
                Some(error) => Err(error),
                None => Ok(0),
            };
        }

        let limit = if self.read_chunk == 0 {
            buf.len()
        } else {
            self.read_chunk.min(buf.len())
        };
        let mut count = 0;
        while count < limit {
            match self.incoming.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        if let Some(error) = self.write_error {
            return Err(error);
        }

        let count = match self.write_budget.as_mut() {
            Some(budget) => {
                let count = (*budget).min(buf.len());
                *budget -= count;
                count
            }
            None => buf.len(),
        };
        self.outgoing.extend_from_slice(&buf[..count]);
        Ok(count)
    }
}
