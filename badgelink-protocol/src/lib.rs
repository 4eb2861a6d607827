//! Badgelink wire protocol
//!
//! This crate defines everything that crosses the radio link between the
//! badge and the browser frontend:
//!
//! - RFC 6455 websocket framing ([`frame`]) and fragmented message
//!   reassembly ([`assembler`])
//! - The one-shot HTTP upgrade handshake ([`handshake`])
//! - The application message schema riding inside frames ([`messages`]) and
//!   the pluggable encodings for it ([`codec`])
//!
//! # Frame Overview
//!
//! ```text
//! ┌─────┬──────┬────────┬──────┬─────────────┬──────────┬─────────────┐
//! │ FIN │ RSV  │ OPCODE │ MASK │ LEN (7 bit) │ EXT LEN  │ MASK KEY    │ PAYLOAD
//! │ 1b  │ 3b   │ 4b     │ 1b   │ 7b          │ 0/2/8 B  │ 0/4 B       │ 0..MAX
//! └─────┴──────┴────────┴──────┴─────────────┴──────────┴─────────────┘
//! ```
//!
//! Client frames are always masked, server frames never are. Everything is
//! bounded at compile time; no allocator is required.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod assembler;
pub mod codec;
pub mod frame;
pub mod handshake;
pub mod messages;

pub use assembler::{AssembledMessage, DataKind, MessageAssembler};
pub use codec::{CodecError, JsonCodec, MessageCodec, PostcardCodec};
pub use frame::{
    encode_header, header_len, CloseCode, Frame, FrameDecoder, FrameError, Opcode,
    MAX_CONTROL_PAYLOAD, MAX_FRAME_SIZE, MAX_HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use handshake::{
    accept_key, accept_response, error_response, parse_upgrade_request, HandshakeError,
    UpgradeRequest,
};
pub use messages::{
    ApplicationMessage, MessageKind, Rgb, SensorId, StatusField, WireRecord, MAX_MESSAGE_SIZE,
};
