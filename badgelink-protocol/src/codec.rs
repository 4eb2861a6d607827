//! Pluggable encodings for [`ApplicationMessage`]
//!
//! The session is generic over [`MessageCodec`]; the frontend contract uses
//! [`JsonCodec`] over text frames, [`PostcardCodec`] over binary frames is the
//! compact alternative. Both serialize the same [`WireRecord`].

use crate::assembler::DataKind;
use crate::frame::Opcode;
use crate::messages::{ApplicationMessage, WireRecord};

/// Errors from encoding or decoding an application message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Serializer failed
    Serialize,
    /// Input is not a well-formed record
    Deserialize,
    /// Bytes remain after one record
    TrailingBytes,
    /// Record is well-formed but a field is out of range
    InvalidValue,
    /// Output buffer too small
    BufferTooSmall,
}

/// Converts messages to and from frame payloads
pub trait MessageCodec {
    /// Opcode used for outbound frames
    fn opcode(&self) -> Opcode;

    /// Whether a message that arrived as `kind` can be decoded at all
    ///
    /// A refused kind ends the session with close code 1003.
    fn accepts(&self, _kind: DataKind) -> bool {
        true
    }

    /// Encode into `out`, returning the number of bytes written
    fn encode(&self, message: &ApplicationMessage, out: &mut [u8]) -> Result<usize, CodecError>;

    /// Decode one complete message payload
    fn decode(&self, bytes: &[u8]) -> Result<ApplicationMessage, CodecError>;
}

/// JSON records in text frames: `{"type":"button_event","id":2,"value":1}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Text
    }

    fn encode(&self, message: &ApplicationMessage, out: &mut [u8]) -> Result<usize, CodecError> {
        serde_json_core::to_slice(&message.to_record(), out).map_err(|err| match err {
            serde_json_core::ser::Error::BufferFull => CodecError::BufferTooSmall,
            _ => CodecError::Serialize,
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<ApplicationMessage, CodecError> {
        let (record, _): (WireRecord, usize) =
            serde_json_core::from_slice(bytes).map_err(|err| match err {
                serde_json_core::de::Error::TrailingCharacters => CodecError::TrailingBytes,
                _ => CodecError::Deserialize,
            })?;
        ApplicationMessage::from_record(&record).ok_or(CodecError::InvalidValue)
    }
}

/// Postcard records in binary frames
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardCodec;

impl MessageCodec for PostcardCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Binary
    }

    fn accepts(&self, kind: DataKind) -> bool {
        kind == DataKind::Binary
    }

    fn encode(&self, message: &ApplicationMessage, out: &mut [u8]) -> Result<usize, CodecError> {
        postcard::to_slice(&message.to_record(), out)
            .map(|used| used.len())
            .map_err(|err| match err {
                postcard::Error::SerializeBufferFull => CodecError::BufferTooSmall,
                _ => CodecError::Serialize,
            })
    }

    fn decode(&self, bytes: &[u8]) -> Result<ApplicationMessage, CodecError> {
        let (record, rest): (WireRecord, &[u8]) =
            postcard::take_from_bytes(bytes).map_err(|_| CodecError::Deserialize)?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes);
        }
        ApplicationMessage::from_record(&record).ok_or(CodecError::InvalidValue)
    }
}
