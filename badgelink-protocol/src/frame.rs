//! Websocket frame encoding and decoding (RFC 6455, section 5.2).
//!
//! Frame header:
//! - byte 0: FIN (1 bit), RSV1-3 (3 bits, must be zero), OPCODE (4 bits)
//! - byte 1: MASK (1 bit), payload length (7 bits)
//! - length 126: 16-bit big-endian length follows
//! - length 127: 64-bit big-endian length follows (MSB must be zero)
//! - 4-byte masking key when MASK is set
//!
//! Decoding works on an accumulated byte buffer and never fails just because
//! the buffer is short; it reports how many bytes a complete frame consumed.

use heapless::Vec;

/// Largest payload any frame may carry. Sizes the static session buffers.
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Largest possible frame header (2 + 8 byte length + 4 byte mask)
pub const MAX_HEADER_SIZE: usize = 14;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = MAX_HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Control frames (close, ping, pong) never carry more than this
pub const MAX_CONTROL_PAYLOAD: usize = 125;

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const OPCODE_BITS: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_BITS: u8 = 0x7F;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// Errors that can occur during frame decoding or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Declared payload exceeds the configured maximum
    PayloadTooLarge,
    /// Opcode is reserved or unknown
    InvalidOpcode(u8),
    /// RSV bits set without a negotiated extension
    ReservedBits,
    /// Client frame arrived without a mask
    UnmaskedFrame,
    /// Server frame arrived with a mask
    MaskedFrame,
    /// Control frame with FIN cleared
    FragmentedControl,
    /// Control frame payload longer than 125 bytes
    ControlTooLong,
    /// Continuation frame with no message in progress
    UnexpectedContinuation,
    /// New data frame while a fragmented message is in progress
    UnexpectedMessageStart,
    /// Text message is not valid UTF-8
    InvalidUtf8,
    /// Close payload of one byte, or a reason that is not UTF-8
    InvalidClosePayload,
    /// Output buffer too small for encoding
    BufferTooSmall,
}

impl FrameError {
    /// Close code to send the peer when this error ends a session
    pub fn close_code(&self) -> CloseCode {
        match self {
            FrameError::PayloadTooLarge => CloseCode::MessageTooBig,
            FrameError::InvalidUtf8 | FrameError::InvalidClosePayload => CloseCode::InvalidPayload,
            FrameError::BufferTooSmall => CloseCode::InternalError,
            _ => CloseCode::ProtocolError,
        }
    }
}

/// Frame opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Parse an opcode from the low nibble of the first header byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Convert to wire format nibble
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns true for close, ping and pong
    pub fn is_control(self) -> bool {
        (self as u8) & 0x08 != 0
    }
}

/// Close status codes (RFC 6455, section 7.4.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CloseCode {
    /// 1000
    Normal,
    /// 1001, endpoint is going away (idle timeout)
    GoingAway,
    /// 1002
    ProtocolError,
    /// 1003
    UnsupportedData,
    /// 1007
    InvalidPayload,
    /// 1008
    PolicyViolation,
    /// 1009
    MessageTooBig,
    /// 1011
    InternalError,
    /// Any other code sent by the peer
    Other(u16),
}

impl CloseCode {
    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => code,
        }
    }
}

/// A decoded or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment of a message
    pub fin: bool,
    /// Frame opcode
    pub opcode: Opcode,
    /// Unmasked payload
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a final frame with the given opcode and payload
    pub fn new(opcode: Opcode, payload: &[u8]) -> Result<Self, FrameError> {
        if opcode.is_control() && payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(FrameError::ControlTooLong);
        }

        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            fin: true,
            opcode,
            payload: payload_vec,
        })
    }

    /// Same frame with the FIN bit set as given
    pub fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    pub fn text(text: &str) -> Result<Self, FrameError> {
        Self::new(Opcode::Text, text.as_bytes())
    }

    pub fn binary(data: &[u8]) -> Result<Self, FrameError> {
        Self::new(Opcode::Binary, data)
    }

    pub fn ping(data: &[u8]) -> Result<Self, FrameError> {
        Self::new(Opcode::Ping, data)
    }

    pub fn pong(data: &[u8]) -> Result<Self, FrameError> {
        Self::new(Opcode::Pong, data)
    }

    /// Build a close frame
    ///
    /// With no code the payload is empty; the reason is only sent alongside
    /// a code.
    pub fn close(code: Option<CloseCode>, reason: &str) -> Result<Self, FrameError> {
        let mut payload = Vec::<u8, MAX_CONTROL_PAYLOAD>::new();
        if let Some(code) = code {
            payload
                .extend_from_slice(&code.to_u16().to_be_bytes())
                .map_err(|_| FrameError::ControlTooLong)?;
            payload
                .extend_from_slice(reason.as_bytes())
                .map_err(|_| FrameError::ControlTooLong)?;
        }
        Self::new(Opcode::Close, &payload)
    }

    /// Status code carried by a close frame, if any
    pub fn close_code(&self) -> Option<CloseCode> {
        if self.opcode != Opcode::Close || self.payload.len() < 2 {
            return None;
        }
        Some(CloseCode::from_u16(u16::from_be_bytes([
            self.payload[0],
            self.payload[1],
        ])))
    }

    /// Check a close frame's payload shape (empty, or code + UTF-8 reason)
    pub fn validate_close(&self) -> Result<(), FrameError> {
        match self.payload.len() {
            0 => Ok(()),
            1 => Err(FrameError::InvalidClosePayload),
            _ => core::str::from_utf8(&self.payload[2..])
                .map(|_| ())
                .map_err(|_| FrameError::InvalidClosePayload),
        }
    }

    /// Number of bytes `encode` will write
    pub fn encoded_len(&self) -> usize {
        header_len(self.payload.len(), false) + self.payload.len()
    }

    /// Encode as an unmasked (server-to-client) frame
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let header = encode_header(self.fin, self.opcode, self.payload.len(), None, buffer)?;
        let end = header + self.payload.len();
        if buffer.len() < end {
            return Err(FrameError::BufferTooSmall);
        }
        buffer[header..end].copy_from_slice(&self.payload);
        Ok(end)
    }

    /// Encode as a masked (client-to-server) frame
    pub fn encode_masked(&self, mask: [u8; 4], buffer: &mut [u8]) -> Result<usize, FrameError> {
        let header = encode_header(
            self.fin,
            self.opcode,
            self.payload.len(),
            Some(mask),
            buffer,
        )?;
        let end = header + self.payload.len();
        if buffer.len() < end {
            return Err(FrameError::BufferTooSmall);
        }
        buffer[header..end].copy_from_slice(&self.payload);
        apply_mask(&mut buffer[header..end], mask);
        Ok(end)
    }

    /// Encode this frame (unmasked) into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut vec = Vec::new();
        vec.resize_default(self.encoded_len())
            .map_err(|_| FrameError::BufferTooSmall)?;
        let len = self.encode(&mut vec)?;
        vec.truncate(len);
        Ok(vec)
    }
}

/// Header size for a payload of the given length
pub const fn header_len(payload_len: usize, masked: bool) -> usize {
    let len_bytes = if payload_len < LEN_16 as usize {
        0
    } else if payload_len <= u16::MAX as usize {
        2
    } else {
        8
    };
    let mask_bytes = if masked { 4 } else { 0 };
    2 + len_bytes + mask_bytes
}

/// Write a frame header using the shortest length encoding
///
/// Lets callers serialize a payload directly after the header without
/// building an intermediate [`Frame`].
pub fn encode_header(
    fin: bool,
    opcode: Opcode,
    payload_len: usize,
    mask: Option<[u8; 4]>,
    buffer: &mut [u8],
) -> Result<usize, FrameError> {
    let len = header_len(payload_len, mask.is_some());
    if buffer.len() < len {
        return Err(FrameError::BufferTooSmall);
    }

    buffer[0] = if fin { FIN_BIT } else { 0 } | opcode.to_u8();
    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };

    let mut pos = 2;
    if payload_len < LEN_16 as usize {
        buffer[1] = mask_bit | payload_len as u8;
    } else if payload_len <= u16::MAX as usize {
        buffer[1] = mask_bit | LEN_16;
        buffer[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
        pos = 4;
    } else {
        buffer[1] = mask_bit | LEN_64;
        buffer[2..10].copy_from_slice(&(payload_len as u64).to_be_bytes());
        pos = 10;
    }

    if let Some(mask) = mask {
        buffer[pos..pos + 4].copy_from_slice(&mask);
    }

    Ok(len)
}

/// XOR a payload with a masking key (masking and unmasking are identical)
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Which side of the connection the decoder sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Role {
    /// Decodes client frames, which must be masked
    Server,
    /// Decodes server frames, which must not be masked
    Client,
}

/// Incremental frame decoder
///
/// Stateless across calls: feed it the whole accumulated receive buffer and
/// drop the consumed prefix after each decoded frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    role: Role,
    max_payload: usize,
}

impl FrameDecoder {
    /// Decoder for client-to-server frames
    ///
    /// `max_payload` is clamped to [`MAX_PAYLOAD_SIZE`].
    pub fn server(max_payload: usize) -> Self {
        Self {
            role: Role::Server,
            max_payload: max_payload.min(MAX_PAYLOAD_SIZE),
        }
    }

    /// Decoder for server-to-client frames
    pub fn client(max_payload: usize) -> Self {
        Self {
            role: Role::Client,
            max_payload: max_payload.min(MAX_PAYLOAD_SIZE),
        }
    }

    /// Largest payload this decoder accepts
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Try to decode one frame from the front of `buffer`
    ///
    /// Returns `Ok((Some(frame), consumed))` for a complete frame and
    /// `Ok((None, 0))` when more bytes are needed. An oversized length is
    /// rejected as soon as the length field is readable, before any payload
    /// has arrived.
    pub fn decode(&self, buffer: &[u8]) -> Result<(Option<Frame>, usize), FrameError> {
        const NEED_MORE: Result<(Option<Frame>, usize), FrameError> = Ok((None, 0));

        if buffer.len() < 2 {
            return NEED_MORE;
        }

        let b0 = buffer[0];
        let b1 = buffer[1];

        if b0 & RSV_BITS != 0 {
            return Err(FrameError::ReservedBits);
        }

        let raw_opcode = b0 & OPCODE_BITS;
        let opcode = Opcode::from_u8(raw_opcode).ok_or(FrameError::InvalidOpcode(raw_opcode))?;
        let fin = b0 & FIN_BIT != 0;
        let masked = b1 & MASK_BIT != 0;

        match (self.role, masked) {
            (Role::Server, false) => return Err(FrameError::UnmaskedFrame),
            (Role::Client, true) => return Err(FrameError::MaskedFrame),
            _ => {}
        }

        if opcode.is_control() && !fin {
            return Err(FrameError::FragmentedControl);
        }

        let (declared, mut pos) = match b1 & LEN_BITS {
            LEN_16 => {
                if buffer.len() < 4 {
                    return NEED_MORE;
                }
                (u16::from_be_bytes([buffer[2], buffer[3]]) as u64, 4)
            }
            LEN_64 => {
                if buffer.len() < 10 {
                    return NEED_MORE;
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buffer[2..10]);
                let len = u64::from_be_bytes(raw);
                if len & (1 << 63) != 0 {
                    return Err(FrameError::PayloadTooLarge);
                }
                (len, 10)
            }
            short => (short as u64, 2),
        };

        if opcode.is_control() && declared > MAX_CONTROL_PAYLOAD as u64 {
            return Err(FrameError::ControlTooLong);
        }
        if declared > self.max_payload as u64 {
            return Err(FrameError::PayloadTooLarge);
        }
        let len = declared as usize;

        let mask = if masked {
            if buffer.len() < pos + 4 {
                return NEED_MORE;
            }
            let key = [
                buffer[pos],
                buffer[pos + 1],
                buffer[pos + 2],
                buffer[pos + 3],
            ];
            pos += 4;
            Some(key)
        } else {
            None
        };

        if buffer.len() < pos + len {
            return NEED_MORE;
        }

        let mut payload = Vec::new();
        payload
            .extend_from_slice(&buffer[pos..pos + len])
            .map_err(|_| FrameError::PayloadTooLarge)?;
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        Ok((
            Some(Frame {
                fin,
                opcode,
                payload,
            }),
            pos + len,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MASK: [u8; 4] = [0x37, 0xFA, 0x21, 0x3D];

    fn masked_bytes(frame: &Frame) -> std::vec::Vec<u8> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode_masked(MASK, &mut buffer).unwrap();
        buffer[..len].to_vec()
    }

    #[test]
    fn test_encode_short_text() {
        let frame = Frame::text("Hello").unwrap();
        let mut buffer = [0u8; 16];
        let len = frame.encode(&mut buffer).unwrap();

        assert_eq!(len, 7);
        assert_eq!(&buffer[..7], &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_decode_rfc_masked_hello() {
        // RFC 6455 section 5.7: single-frame masked text message
        let bytes = [
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ];
        let (frame, used) = FrameDecoder::server(MAX_PAYLOAD_SIZE)
            .decode(&bytes)
            .unwrap();
        let frame = frame.unwrap();

        assert_eq!(used, bytes.len());
        assert!(frame.fin);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(&frame.payload[..], b"Hello");
    }

    #[test]
    fn test_extended_16_bit_length() {
        let payload = [0xAB; 300];
        let frame = Frame::binary(&payload).unwrap();
        let encoded = frame.encode_to_vec().unwrap();

        assert_eq!(encoded[1], 126);
        assert_eq!(u16::from_be_bytes([encoded[2], encoded[3]]), 300);
        assert_eq!(encoded.len(), 4 + 300);
    }

    #[test]
    fn test_header_for_64_bit_length() {
        let mut buffer = [0u8; MAX_HEADER_SIZE];
        let len = encode_header(true, Opcode::Binary, 70_000, Some(MASK), &mut buffer).unwrap();

        assert_eq!(len, 14);
        assert_eq!(buffer[1], MASK_BIT | 127);
        assert_eq!(&buffer[2..10], &70_000u64.to_be_bytes());
        assert_eq!(&buffer[10..14], &MASK);
    }

    #[test]
    fn test_need_more_data() {
        let bytes = masked_bytes(&Frame::text("partial").unwrap());
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);

        for cut in 0..bytes.len() {
            assert_eq!(decoder.decode(&bytes[..cut]), Ok((None, 0)));
        }
    }

    #[test]
    fn test_oversized_rejected_from_header_alone() {
        // Only the 4 header bytes of a 2000-byte binary frame have arrived
        let header = [0x82, MASK_BIT | 126, 0x07, 0xD0];
        let decoder = FrameDecoder::server(512);
        assert_eq!(decoder.decode(&header), Err(FrameError::PayloadTooLarge));
    }

    #[test]
    fn test_configured_max_is_clamped() {
        let decoder = FrameDecoder::server(1 << 20);
        assert_eq!(decoder.max_payload(), MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_64_bit_length_msb_rejected() {
        let mut header = [0u8; 14];
        header[0] = 0x82;
        header[1] = MASK_BIT | 127;
        header[2] = 0x80;
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);
        assert_eq!(decoder.decode(&header), Err(FrameError::PayloadTooLarge));
    }

    #[test]
    fn test_unmasked_client_frame_rejected() {
        let encoded = Frame::text("hi").unwrap().encode_to_vec().unwrap();
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);
        assert_eq!(decoder.decode(&encoded), Err(FrameError::UnmaskedFrame));
    }

    #[test]
    fn test_masked_server_frame_rejected() {
        let bytes = masked_bytes(&Frame::text("hi").unwrap());
        let decoder = FrameDecoder::client(MAX_PAYLOAD_SIZE);
        assert_eq!(decoder.decode(&bytes), Err(FrameError::MaskedFrame));
    }

    #[test]
    fn test_reserved_opcode_rejected() {
        let bytes = [0x83, MASK_BIT, 0, 0, 0, 0];
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);
        assert_eq!(decoder.decode(&bytes), Err(FrameError::InvalidOpcode(0x3)));
    }

    #[test]
    fn test_reserved_bits_rejected() {
        let bytes = [0xC1, MASK_BIT, 0, 0, 0, 0];
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);
        assert_eq!(decoder.decode(&bytes), Err(FrameError::ReservedBits));
    }

    #[test]
    fn test_fragmented_ping_rejected() {
        let bytes = [0x09, MASK_BIT, 0, 0, 0, 0];
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);
        assert_eq!(decoder.decode(&bytes), Err(FrameError::FragmentedControl));
    }

    #[test]
    fn test_long_control_rejected() {
        assert_eq!(
            Frame::ping(&[0u8; 126]).unwrap_err(),
            FrameError::ControlTooLong
        );

        let header = [0x89, MASK_BIT | 126, 0x00, 0x7E];
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);
        assert_eq!(decoder.decode(&header), Err(FrameError::ControlTooLong));
    }

    #[test]
    fn test_close_frame_code_and_reason() {
        let frame = Frame::close(Some(CloseCode::GoingAway), "idle").unwrap();

        assert_eq!(&frame.payload[..2], &1001u16.to_be_bytes());
        assert_eq!(&frame.payload[2..], b"idle");
        assert_eq!(frame.close_code(), Some(CloseCode::GoingAway));
        assert!(frame.validate_close().is_ok());
    }

    #[test]
    fn test_close_without_code() {
        let frame = Frame::close(None, "ignored").unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(frame.close_code(), None);
    }

    #[test]
    fn test_one_byte_close_payload_invalid() {
        let frame = Frame::new(Opcode::Close, &[0x03]).unwrap();
        assert_eq!(frame.validate_close(), Err(FrameError::InvalidClosePayload));
    }

    #[test]
    fn test_close_code_mapping() {
        assert_eq!(CloseCode::from_u16(1009), CloseCode::MessageTooBig);
        assert_eq!(CloseCode::from_u16(4000), CloseCode::Other(4000));
        assert_eq!(CloseCode::Other(4000).to_u16(), 4000);
        assert_eq!(
            FrameError::PayloadTooLarge.close_code(),
            CloseCode::MessageTooBig
        );
        assert_eq!(
            FrameError::UnmaskedFrame.close_code(),
            CloseCode::ProtocolError
        );
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut bytes = masked_bytes(&Frame::ping(b"a").unwrap());
        bytes.extend(masked_bytes(&Frame::text("b").unwrap()));
        let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);

        let (first, used) = decoder.decode(&bytes).unwrap();
        assert_eq!(first.unwrap().opcode, Opcode::Ping);

        let (second, rest) = decoder.decode(&bytes[used..]).unwrap();
        assert_eq!(second.unwrap().opcode, Opcode::Text);
        assert_eq!(used + rest, bytes.len());
    }

    fn arb_frame() -> impl Strategy<Value = Frame> {
        let data = (
            prop_oneof![
                Just(Opcode::Text),
                Just(Opcode::Binary),
                Just(Opcode::Continuation)
            ],
            any::<bool>(),
            proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE),
        )
            .prop_map(|(opcode, fin, payload)| {
                Frame::new(opcode, &payload).unwrap().with_fin(fin)
            });
        let control = (
            prop_oneof![Just(Opcode::Close), Just(Opcode::Ping), Just(Opcode::Pong)],
            proptest::collection::vec(any::<u8>(), 0..=MAX_CONTROL_PAYLOAD),
        )
            .prop_map(|(opcode, payload)| Frame::new(opcode, &payload).unwrap());
        prop_oneof![3 => data, 1 => control]
    }

    proptest! {
        #[test]
        fn prop_roundtrip_unmasked(frame in arb_frame()) {
            let encoded = frame.encode_to_vec().unwrap();
            let (decoded, used) = FrameDecoder::client(MAX_PAYLOAD_SIZE).decode(&encoded).unwrap();
            prop_assert_eq!(used, encoded.len());
            prop_assert_eq!(decoded, Some(frame));
        }

        #[test]
        fn prop_roundtrip_masked(frame in arb_frame(), mask in any::<[u8; 4]>()) {
            let mut buffer = [0u8; MAX_FRAME_SIZE];
            let len = frame.encode_masked(mask, &mut buffer).unwrap();
            let (decoded, used) = FrameDecoder::server(MAX_PAYLOAD_SIZE).decode(&buffer[..len]).unwrap();
            prop_assert_eq!(used, len);
            prop_assert_eq!(decoded, Some(frame));
        }

        #[test]
        fn prop_split_reads_match_whole(
            frame in arb_frame(),
            chunks in proptest::collection::vec(1usize..64, 1..64),
        ) {
            let bytes = masked_bytes(&frame);
            let decoder = FrameDecoder::server(MAX_PAYLOAD_SIZE);
            let whole = decoder.decode(&bytes).unwrap();

            // Accumulate the same bytes as a session would across partial reads
            let mut received = std::vec::Vec::new();
            let mut offset = 0;
            let mut sizes = chunks.iter().cycle();
            let mut result = None;
            while offset < bytes.len() {
                let size = (*sizes.next().unwrap()).min(bytes.len() - offset);
                received.extend_from_slice(&bytes[offset..offset + size]);
                offset += size;

                let (decoded, used) = decoder.decode(&received).unwrap();
                if decoded.is_some() {
                    prop_assert_eq!(offset, bytes.len());
                    result = Some((decoded, used));
                }
            }

            prop_assert_eq!(result, Some(whole));
        }
    }
}
