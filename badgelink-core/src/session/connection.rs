//! Websocket connection session
//!
//! Owns one accepted transport from the upgrade request until close. Each
//! [`Session::poll`] while open:
//!
//! 1. Reads whatever the transport has into the receive buffer
//! 2. Decodes complete frames, answers pings, forwards decoded messages
//!    inbound
//! 3. Encodes outbound messages while the send buffer has room
//! 4. Writes as much of the send buffer as the transport accepts, keeping
//!    the remainder for the next poll
//!
//! Both buffers live inside the session; nothing is allocated.

use badgelink_protocol::assembler::MessageAssembler;
use badgelink_protocol::handshake::{self, HandshakeError};
use badgelink_protocol::{
    encode_header, header_len, ApplicationMessage, CloseCode, FrameDecoder, FrameError,
    MessageCodec, Opcode, MAX_CONTROL_PAYLOAD, MAX_FRAME_SIZE, MAX_MESSAGE_SIZE,
};

use heapless::String;

use crate::bridge::NetworkPort;
use crate::config::types::MAX_PATH_LEN;
use crate::config::BridgeConfig;
use crate::elapsed_ms;
use crate::traits::{Transport, TransportError};

use super::state::{SessionEvent, SessionState};

/// Receive buffer: one maximal frame plus slack for the next header
pub const RX_BUFFER_SIZE: usize = 1280;

/// Send buffer
pub const TX_BUFFER_SIZE: usize = 1024;

/// Room needed for a pong or close frame
const CONTROL_FRAME_RESERVE: usize =
    header_len(MAX_CONTROL_PAYLOAD, false) + MAX_CONTROL_PAYLOAD;

/// Room needed for one encoded application message
const MESSAGE_FRAME_RESERVE: usize = header_len(MAX_MESSAGE_SIZE, false) + MAX_MESSAGE_SIZE;

const _: () = assert!(RX_BUFFER_SIZE >= MAX_FRAME_SIZE);
const _: () = assert!(RX_BUFFER_SIZE >= handshake::MAX_REQUEST_SIZE);
const _: () = assert!(TX_BUFFER_SIZE >= handshake::RESPONSE_CAPACITY);

/// Why a session left the open state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// Upgrade refused
    Handshake(HandshakeError),
    /// Client violated the framing rules
    Frame(FrameError),
    /// Data frame kind the codec cannot decode
    UnsupportedData,
    /// Socket failure
    Transport(TransportError),
    /// No bytes from the peer within the idle timeout
    IdleTimeout,
    /// Peer never answered our close frame
    CloseTimeout,
    /// A response did not fit the send buffer
    BufferOverflow,
}

impl SessionError {
    /// Close code sent to the peer, if the error leaves a chance to send one
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            SessionError::Frame(err) => Some(err.close_code()),
            SessionError::UnsupportedData => Some(CloseCode::UnsupportedData),
            SessionError::IdleTimeout => Some(CloseCode::GoingAway),
            _ => None,
        }
    }
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionStats {
    pub frames_in: u32,
    pub frames_out: u32,
    pub messages_in: u32,
    pub messages_out: u32,
    /// Inbound messages lost to a full queue
    pub dropped_inbound: u32,
    /// Payloads that failed to decode, or messages that failed to encode
    pub codec_errors: u32,
    pub pings_answered: u32,
}

/// Result of one [`Session::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    pub previous: SessionState,
    pub state: SessionState,
    /// Error raised during this poll
    pub error: Option<SessionError>,
}

impl PollOutcome {
    pub fn changed(&self) -> bool {
        self.previous != self.state
    }
}

/// One websocket connection
pub struct Session<T, C> {
    transport: T,
    codec: C,
    path: String<MAX_PATH_LEN>,
    idle_timeout_ms: u32,
    handshake_timeout_ms: u32,
    close_timeout_ms: u32,
    sync_on_connect: bool,
    state: SessionState,
    decoder: FrameDecoder,
    assembler: MessageAssembler,
    rx: [u8; RX_BUFFER_SIZE],
    rx_len: usize,
    tx: [u8; TX_BUFFER_SIZE],
    tx_len: usize,
    created_ms: u32,
    last_activity_ms: u32,
    closing_since_ms: u32,
    close_pending: Option<CloseCode>,
    close_sent: bool,
    close_received: bool,
    stats: SessionStats,
}

impl<T: Transport, C: MessageCodec> Session<T, C> {
    /// Start a session on a freshly accepted transport
    pub fn new(transport: T, codec: C, config: &BridgeConfig, now_ms: u32) -> Self {
        Self {
            transport,
            codec,
            path: config.path.clone(),
            idle_timeout_ms: config.idle_timeout_ms,
            handshake_timeout_ms: config.handshake_timeout_ms,
            close_timeout_ms: config.close_timeout_ms,
            sync_on_connect: config.sync_on_connect,
            state: SessionState::Handshaking,
            decoder: FrameDecoder::server(config.max_frame_bytes),
            assembler: MessageAssembler::new(),
            rx: [0; RX_BUFFER_SIZE],
            rx_len: 0,
            tx: [0; TX_BUFFER_SIZE],
            tx_len: 0,
            created_ms: now_ms,
            last_activity_ms: now_ms,
            closing_since_ms: now_ms,
            close_pending: None,
            close_sent: false,
            close_received: false,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Advance the session by one step
    pub fn poll(&mut self, now_ms: u32, port: &mut NetworkPort<'_>) -> PollOutcome {
        let previous = self.state;
        let result = match self.state {
            SessionState::Handshaking => self.step_handshake(now_ms, port),
            SessionState::Open => self.step_open(now_ms, port),
            SessionState::Closing => self.step_closing(now_ms),
            SessionState::Closed => Ok(()),
        };

        let error = result.err();
        if let Some(err) = error {
            self.handle_error(err, now_ms);
        }

        PollOutcome {
            previous,
            state: self.state,
            error,
        }
    }

    fn step_handshake(
        &mut self,
        now_ms: u32,
        port: &mut NetworkPort<'_>,
    ) -> Result<(), SessionError> {
        if elapsed_ms(now_ms, self.created_ms) >= self.handshake_timeout_ms {
            return Err(SessionError::Handshake(HandshakeError::Timeout));
        }

        if let Some(err) = self.fill_rx(now_ms) {
            return Err(SessionError::Transport(err));
        }
        let parsed = handshake::parse_upgrade_request(&self.rx[..self.rx_len], &self.path)
            .map_err(SessionError::Handshake)?;
        let Some((request, used)) = parsed else {
            return Ok(());
        };

        let response =
            handshake::accept_response(&request).map_err(|_| SessionError::BufferOverflow)?;
        self.queue_bytes(response.as_bytes())?;
        self.consume_rx(used);

        self.state = self.state.transition(SessionEvent::Upgraded);
        self.last_activity_ms = now_ms;

        if self.sync_on_connect {
            self.forward(ApplicationMessage::LedQuery, port);
        }

        // The client may have sent frames right behind the request
        self.step_open(now_ms, port)
    }

    fn step_open(&mut self, now_ms: u32, port: &mut NetworkPort<'_>) -> Result<(), SessionError> {
        // Frames read before a transport error are still delivered
        let read_error = self.fill_rx(now_ms);
        self.process_frames(now_ms, port)?;

        if self.state == SessionState::Closing {
            self.step_closing(now_ms)?;
            return match read_error {
                Some(err) if self.state != SessionState::Closed => {
                    Err(SessionError::Transport(err))
                }
                _ => Ok(()),
            };
        }
        if let Some(err) = read_error {
            return Err(SessionError::Transport(err));
        }

        if elapsed_ms(now_ms, self.last_activity_ms) >= self.idle_timeout_ms {
            return Err(SessionError::IdleTimeout);
        }

        self.drain_outbound(port)?;
        self.flush()
    }

    fn step_closing(&mut self, now_ms: u32) -> Result<(), SessionError> {
        if let Some(code) = self.close_pending {
            if self.tx_free() >= CONTROL_FRAME_RESERVE {
                self.queue_frame(Opcode::Close, &code.to_u16().to_be_bytes())?;
                self.close_pending = None;
                self.close_sent = true;
            }
        }
        self.flush()?;

        let mut read_error = None;
        if !self.close_received {
            read_error = self.fill_rx(now_ms);
            self.await_close_echo()?;
        }

        if self.close_sent && self.close_received && self.tx_len == 0 {
            self.terminate(SessionEvent::CloseCompleted);
        } else if let Some(err) = read_error {
            return Err(SessionError::Transport(err));
        } else if elapsed_ms(now_ms, self.closing_since_ms) >= self.close_timeout_ms {
            return Err(SessionError::CloseTimeout);
        }
        Ok(())
    }

    /// Decode every complete frame in the receive buffer
    fn process_frames(
        &mut self,
        now_ms: u32,
        port: &mut NetworkPort<'_>,
    ) -> Result<(), SessionError> {
        // Frames stay buffered while there is no room for a control reply
        while self.tx_free() >= CONTROL_FRAME_RESERVE {
            let (frame, used) = match self.decoder.decode(&self.rx[..self.rx_len]) {
                Ok((Some(frame), used)) => (frame, used),
                Ok((None, _)) => break,
                Err(err) => return Err(SessionError::Frame(err)),
            };
            self.consume_rx(used);
            self.stats.frames_in = self.stats.frames_in.wrapping_add(1);

            match frame.opcode {
                Opcode::Ping => {
                    self.queue_frame(Opcode::Pong, &frame.payload)?;
                    self.stats.pings_answered = self.stats.pings_answered.wrapping_add(1);
                }
                Opcode::Pong => {}
                Opcode::Close => {
                    frame.validate_close().map_err(SessionError::Frame)?;
                    self.close_received = true;
                    let code = frame.close_code().unwrap_or(CloseCode::Normal);
                    self.begin_close(code, SessionEvent::CloseReceived, now_ms);
                    return Ok(());
                }
                Opcode::Text | Opcode::Binary | Opcode::Continuation => {
                    let Some(message) = self.assembler.push(&frame).map_err(SessionError::Frame)?
                    else {
                        continue;
                    };
                    if !self.codec.accepts(message.kind) {
                        return Err(SessionError::UnsupportedData);
                    }
                    match self.codec.decode(message.payload) {
                        Ok(decoded) => {
                            self.stats.messages_in = self.stats.messages_in.wrapping_add(1);
                            self.forward(decoded, port);
                        }
                        Err(_) => {
                            self.stats.codec_errors = self.stats.codec_errors.wrapping_add(1);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// While closing, discard everything but the peer's close frame
    fn await_close_echo(&mut self) -> Result<(), SessionError> {
        loop {
            let (frame, used) = match self.decoder.decode(&self.rx[..self.rx_len]) {
                Ok((Some(frame), used)) => (frame, used),
                Ok((None, _)) => return Ok(()),
                Err(err) => return Err(SessionError::Frame(err)),
            };
            self.consume_rx(used);
            if frame.opcode == Opcode::Close {
                self.close_received = true;
                self.rx_len = 0;
                return Ok(());
            }
        }
    }

    /// Encode outbound messages while a maximal message frame still fits
    fn drain_outbound(&mut self, port: &mut NetworkPort<'_>) -> Result<(), SessionError> {
        let opcode = self.codec.opcode();
        while self.tx_free() >= MESSAGE_FRAME_RESERVE {
            let Some(message) = port.outbound.try_recv() else {
                break;
            };

            let mut payload = [0u8; MAX_MESSAGE_SIZE];
            match self.codec.encode(&message, &mut payload) {
                Ok(len) => {
                    self.queue_frame(opcode, &payload[..len])?;
                    self.stats.messages_out = self.stats.messages_out.wrapping_add(1);
                }
                Err(_) => {
                    self.stats.codec_errors = self.stats.codec_errors.wrapping_add(1);
                }
            }
        }
        Ok(())
    }

    fn forward(&mut self, message: ApplicationMessage, port: &mut NetworkPort<'_>) {
        if port.inbound.try_send(message).is_err() {
            self.stats.dropped_inbound = self.stats.dropped_inbound.wrapping_add(1);
        }
    }

    fn begin_close(&mut self, code: CloseCode, event: SessionEvent, now_ms: u32) {
        self.state = self.state.transition(event);
        self.closing_since_ms = now_ms;
        self.close_pending = Some(code);
        self.assembler.reset();
        self.rx_len = 0;
    }

    fn handle_error(&mut self, err: SessionError, now_ms: u32) {
        match err {
            SessionError::Handshake(reason) => {
                self.send_rejection(reason);
                self.terminate(SessionEvent::HandshakeFailed);
            }
            SessionError::Frame(_) | SessionError::UnsupportedData | SessionError::IdleTimeout
                if self.state == SessionState::Open =>
            {
                let event = if err == SessionError::IdleTimeout {
                    SessionEvent::TimedOut
                } else {
                    SessionEvent::CloseInitiated
                };
                let code = err.close_code().unwrap_or(CloseCode::ProtocolError);
                self.begin_close(code, event, now_ms);
                if self.step_closing(now_ms).is_err() {
                    self.terminate(SessionEvent::Fault);
                }
            }
            SessionError::CloseTimeout => self.terminate(SessionEvent::TimedOut),
            _ => self.terminate(SessionEvent::Fault),
        }
    }

    /// Best-effort HTTP error response before the socket is dropped
    fn send_rejection(&mut self, reason: HandshakeError) {
        self.tx_len = 0;
        if let Ok(response) = handshake::error_response(reason) {
            if self.queue_bytes(response.as_bytes()).is_ok() {
                let _ = self.flush();
            }
        }
    }

    /// Walk the lifecycle to `Closed` and drop buffered data
    fn terminate(&mut self, event: SessionEvent) {
        loop {
            let next = self.state.transition(event);
            if next == self.state {
                break;
            }
            self.state = next;
        }
        self.rx_len = 0;
        self.tx_len = 0;
        self.close_pending = None;
        self.assembler.reset();
    }

    /// Read until the buffer is full or the transport runs dry
    ///
    /// A read error stops the loop and is returned after the bytes read
    /// before it have been buffered.
    fn fill_rx(&mut self, now_ms: u32) -> Option<TransportError> {
        let mut total = 0;
        let mut error = None;
        while self.rx_len < RX_BUFFER_SIZE {
            match self.transport.try_read(&mut self.rx[self.rx_len..]) {
                Ok(0) => break,
                Ok(read) => {
                    self.rx_len += read;
                    total += read;
                }
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }
        if total > 0 {
            self.last_activity_ms = now_ms;
        }
        error
    }

    fn consume_rx(&mut self, used: usize) {
        self.rx.copy_within(used..self.rx_len, 0);
        self.rx_len -= used;
    }

    fn tx_free(&self) -> usize {
        TX_BUFFER_SIZE - self.tx_len
    }

    fn queue_bytes(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let end = self.tx_len + bytes.len();
        if end > TX_BUFFER_SIZE {
            return Err(SessionError::BufferOverflow);
        }
        self.tx[self.tx_len..end].copy_from_slice(bytes);
        self.tx_len = end;
        Ok(())
    }

    fn queue_frame(&mut self, opcode: Opcode, payload: &[u8]) -> Result<(), SessionError> {
        if self.tx_free() < header_len(payload.len(), false) + payload.len() {
            return Err(SessionError::BufferOverflow);
        }
        let header = encode_header(true, opcode, payload.len(), None, &mut self.tx[self.tx_len..])
            .map_err(|_| SessionError::BufferOverflow)?;
        self.tx_len += header;
        self.queue_bytes(payload)?;
        self.stats.frames_out = self.stats.frames_out.wrapping_add(1);
        Ok(())
    }

    /// Write as much of the send buffer as the transport takes
    fn flush(&mut self) -> Result<(), SessionError> {
        let mut written = 0;
        while written < self.tx_len {
            let count = self
                .transport
                .try_write(&self.tx[written..self.tx_len])
                .map_err(SessionError::Transport)?;
            if count == 0 {
                break;
            }
            written += count;
        }
        if written > 0 {
            self.tx.copy_within(written..self.tx_len, 0);
            self.tx_len -= written;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Bridge, HardwarePort};
    use crate::session::mock::{MockTransport, UPGRADE_REQUEST};
    use badgelink_protocol::{Frame, JsonCodec, PostcardCodec, Rgb};

    type TestSession = Session<MockTransport, JsonCodec>;

    fn config() -> BridgeConfig {
        BridgeConfig {
            sync_on_connect: false,
            ..BridgeConfig::default()
        }
    }

    fn open_session(config: &BridgeConfig, net: &mut NetworkPort<'_>) -> TestSession {
        let mut transport = MockTransport::new();
        transport.push_bytes(UPGRADE_REQUEST.as_bytes());
        let mut session = Session::new(transport, JsonCodec, config, 0);

        let outcome = session.poll(0, net);
        assert_eq!(outcome.state, SessionState::Open);
        let response = session.transport_mut().take_response();
        assert!(response.starts_with("HTTP/1.1 101"));
        session
    }

    fn drain_hw(hw: &mut HardwarePort<'_>) -> std::vec::Vec<ApplicationMessage> {
        hw.inbound.drain().collect()
    }

    #[test]
    fn test_upgrade_reaches_open() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut transport = MockTransport::new();
        transport.push_bytes(UPGRADE_REQUEST.as_bytes());
        let mut session = Session::new(transport, JsonCodec, &config(), 0);

        let outcome = session.poll(10, &mut net);

        assert_eq!(outcome.previous, SessionState::Handshaking);
        assert_eq!(outcome.state, SessionState::Open);
        assert!(outcome.changed());
        let response = session.transport_mut().take_response();
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    }

    #[test]
    fn test_request_split_across_reads() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut session = Session::new(MockTransport::new(), JsonCodec, &config(), 0);

        let (first, second) = UPGRADE_REQUEST.as_bytes().split_at(30);
        session.transport_mut().push_bytes(first);
        assert_eq!(session.poll(1, &mut net).state, SessionState::Handshaking);

        session.transport_mut().push_bytes(second);
        assert_eq!(session.poll(2, &mut net).state, SessionState::Open);
    }

    #[test]
    fn test_bad_request_rejected_and_closed() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut transport = MockTransport::new();
        transport.push_bytes(UPGRADE_REQUEST.replace("/ws", "/").as_bytes());
        let mut session = Session::new(transport, JsonCodec, &config(), 0);

        let outcome = session.poll(0, &mut net);

        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(
            outcome.error,
            Some(SessionError::Handshake(HandshakeError::NotFound))
        );
        assert!(session
            .transport_mut()
            .take_response()
            .starts_with("HTTP/1.1 404 Not Found"));
        assert!(drain_hw(&mut hw).is_empty());
    }

    #[test]
    fn test_handshake_timeout() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let cfg = config();
        let mut session = Session::new(MockTransport::new(), JsonCodec, &cfg, 100);

        let deadline = 100 + cfg.handshake_timeout_ms;
        assert_eq!(
            session.poll(deadline - 1, &mut net).state,
            SessionState::Handshaking
        );
        let outcome = session.poll(deadline, &mut net);
        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(
            outcome.error,
            Some(SessionError::Handshake(HandshakeError::Timeout))
        );
    }

    #[test]
    fn test_sync_on_connect_queues_led_query() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let cfg = BridgeConfig::default();
        open_session(&cfg, &mut net);

        assert_eq!(drain_hw(&mut hw), [ApplicationMessage::LedQuery]);
    }

    #[test]
    fn test_frames_behind_request_are_processed() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut transport = MockTransport::new();
        transport.push_bytes(UPGRADE_REQUEST.as_bytes());
        transport.push_frame(&Frame::text(r#"{"type":"led_query","id":0,"value":0}"#).unwrap());
        let mut session = Session::new(transport, JsonCodec, &config(), 0);

        session.poll(0, &mut net);

        assert_eq!(drain_hw(&mut hw), [ApplicationMessage::LedQuery]);
    }

    #[test]
    fn test_command_forwarded_inbound() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        session
            .transport_mut()
            .push_frame(&Frame::text(r#"{"type":"led_command","id":3,"value":255}"#).unwrap());
        session.poll(5, &mut net);

        assert_eq!(
            drain_hw(&mut hw),
            [ApplicationMessage::LedCommand {
                id: 3,
                color: Rgb::new(0, 0, 255)
            }]
        );
        assert_eq!(session.stats().messages_in, 1);
    }

    #[test]
    fn test_fragmented_command_with_partial_reads() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);
        session.transport_mut().read_chunk = 3;

        let json = br#"{"type":"led_command","id":1,"value":16}"#;
        let (head, tail) = json.split_at(10);
        session
            .transport_mut()
            .push_frame(&Frame::new(Opcode::Text, head).unwrap().with_fin(false));
        session
            .transport_mut()
            .push_frame(&Frame::new(Opcode::Continuation, tail).unwrap());
        session.poll(1, &mut net);

        assert_eq!(
            drain_hw(&mut hw),
            [ApplicationMessage::LedCommand {
                id: 1,
                color: Rgb::new(0, 0, 16)
            }]
        );
    }

    #[test]
    fn test_ping_answered_with_pong() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        session.transport_mut().push_frame(&Frame::ping(b"are you there").unwrap());
        session.poll(1, &mut net);

        let frames = session.transport_mut().take_frames();
        assert_eq!(frames, [Frame::pong(b"are you there").unwrap()]);
        assert!(drain_hw(&mut hw).is_empty());
        assert_eq!(session.stats().pings_answered, 1);
    }

    #[test]
    fn test_outbound_messages_encoded() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        hw.outbound
            .try_send(ApplicationMessage::ButtonEvent { id: 2, pressed: true })
            .unwrap();
        session.poll(1, &mut net);

        let frames = session.transport_mut().take_frames();
        assert_eq!(
            frames,
            [Frame::text(r#"{"type":"button_event","id":2,"value":1}"#).unwrap()]
        );
    }

    #[test]
    fn test_partial_writes_resume_in_order() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        for id in 0..4 {
            hw.outbound
                .try_send(ApplicationMessage::ButtonEvent { id, pressed: true })
                .unwrap();
        }
        session.transport_mut().write_budget = Some(7);
        session.poll(1, &mut net);
        assert_eq!(session.transport().outgoing.len(), 7);

        session.transport_mut().write_budget = None;
        session.poll(2, &mut net);

        let ids: std::vec::Vec<_> = session
            .transport_mut()
            .take_frames()
            .iter()
            .map(|f| JsonCodec.decode(&f.payload).unwrap())
            .collect();
        assert_eq!(
            ids,
            (0..4)
                .map(|id| ApplicationMessage::ButtonEvent { id, pressed: true })
                .collect::<std::vec::Vec<_>>()
        );
    }

    #[test]
    fn test_full_send_buffer_leaves_messages_queued() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        for seq in 0..32 {
            hw.outbound
                .try_send(ApplicationMessage::Heartbeat { seq })
                .unwrap();
        }
        session.transport_mut().write_budget = Some(0);
        session.poll(1, &mut net);

        // The send buffer filled before the queue emptied
        assert!(!net.outbound.is_empty());

        session.transport_mut().write_budget = None;
        for now in 2..10 {
            session.poll(now, &mut net);
        }
        assert!(net.outbound.is_empty());
        assert_eq!(session.transport_mut().take_frames().len(), 32);
    }

    #[test]
    fn test_oversized_frame_closes_without_forwarding() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let cfg = BridgeConfig {
            max_frame_bytes: 128,
            ..config()
        };
        let mut session = open_session(&cfg, &mut net);

        // Header of a 300-byte text frame; the payload never arrives
        session
            .transport_mut()
            .push_bytes(&[0x81, 0x80 | 126, 0x01, 0x2C, 1, 2, 3, 4]);
        let outcome = session.poll(1, &mut net);

        assert_eq!(outcome.previous, SessionState::Open);
        assert_eq!(outcome.state, SessionState::Closing);
        assert_eq!(
            outcome.error,
            Some(SessionError::Frame(FrameError::PayloadTooLarge))
        );
        assert!(drain_hw(&mut hw).is_empty());

        let frames = session.transport_mut().take_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].close_code(), Some(CloseCode::MessageTooBig));
    }

    #[test]
    fn test_unmasked_frame_is_protocol_error() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        let unmasked = Frame::text("hi").unwrap().encode_to_vec().unwrap();
        session.transport_mut().push_bytes(&unmasked);
        session.poll(1, &mut net);

        let frames = session.transport_mut().take_frames();
        assert_eq!(frames[0].close_code(), Some(CloseCode::ProtocolError));
    }

    #[test]
    fn test_undecodable_message_is_counted_not_fatal() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        session.transport_mut().push_frame(&Frame::text("{}").unwrap());
        let outcome = session.poll(1, &mut net);

        assert_eq!(outcome.state, SessionState::Open);
        assert_eq!(session.stats().codec_errors, 1);
        assert!(drain_hw(&mut hw).is_empty());
    }

    #[test]
    fn test_text_frame_refused_by_binary_codec() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut transport = MockTransport::new();
        transport.push_bytes(UPGRADE_REQUEST.as_bytes());
        transport.push_frame(&Frame::text("hello").unwrap());
        let mut session = Session::new(transport, PostcardCodec, &config(), 0);

        let outcome = session.poll(0, &mut net);

        assert_eq!(outcome.state, SessionState::Closing);
        assert_eq!(outcome.error, Some(SessionError::UnsupportedData));
        session.transport_mut().take_response();
        let frames = session.transport_mut().take_frames();
        assert_eq!(frames[0].close_code(), Some(CloseCode::UnsupportedData));
    }

    #[test]
    fn test_peer_close_is_echoed() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        session
            .transport_mut()
            .push_frame(&Frame::close(Some(CloseCode::Normal), "bye").unwrap());
        let outcome = session.poll(1, &mut net);

        assert_eq!(outcome.state, SessionState::Closed);
        let frames = session.transport_mut().take_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].close_code(), Some(CloseCode::Normal));
    }

    #[test]
    fn test_idle_timeout_closes() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let cfg = BridgeConfig {
            idle_timeout_ms: 1_000,
            close_timeout_ms: 500,
            ..config()
        };
        let mut session = open_session(&cfg, &mut net);

        assert_eq!(session.poll(999, &mut net).state, SessionState::Open);

        let outcome = session.poll(1_000, &mut net);
        assert_eq!(outcome.state, SessionState::Closing);
        assert_eq!(outcome.error, Some(SessionError::IdleTimeout));
        let frames = session.transport_mut().take_frames();
        assert_eq!(frames[0].close_code(), Some(CloseCode::GoingAway));

        // Peer never echoes
        assert_eq!(session.poll(1_499, &mut net).state, SessionState::Closing);
        let outcome = session.poll(1_500, &mut net);
        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(outcome.error, Some(SessionError::CloseTimeout));
    }

    #[test]
    fn test_activity_defers_idle_timeout() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let cfg = BridgeConfig {
            idle_timeout_ms: 1_000,
            ..config()
        };
        let mut session = open_session(&cfg, &mut net);

        session.transport_mut().push_frame(&Frame::pong(b"").unwrap());
        session.poll(900, &mut net);
        assert_eq!(session.poll(1_800, &mut net).state, SessionState::Open);
    }

    #[test]
    fn test_close_echo_completes_initiated_close() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let cfg = BridgeConfig {
            idle_timeout_ms: 1_000,
            ..config()
        };
        let mut session = open_session(&cfg, &mut net);

        session.poll(1_000, &mut net);
        assert_eq!(session.state(), SessionState::Closing);

        session
            .transport_mut()
            .push_frame(&Frame::close(Some(CloseCode::GoingAway), "").unwrap());
        assert_eq!(session.poll(1_010, &mut net).state, SessionState::Closed);
    }

    #[test]
    fn test_read_error_closes() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        session.transport_mut().read_error = Some(TransportError::Reset);
        let outcome = session.poll(1, &mut net);

        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(
            outcome.error,
            Some(SessionError::Transport(TransportError::Reset))
        );
    }

    #[test]
    fn test_frames_before_read_error_are_delivered() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        let transport = session.transport_mut();
        let command = r#"{"type":"led_command","id":1,"value":65280}"#;
        transport.push_frame(&Frame::text(command).unwrap());
        transport.push_frame(&Frame::close(Some(CloseCode::Normal), "").unwrap());
        transport.read_error = Some(TransportError::Closed);
        let outcome = session.poll(1, &mut net);

        assert_eq!(
            drain_hw(&mut hw),
            [ApplicationMessage::LedCommand {
                id: 1,
                color: Rgb::new(0, 255, 0)
            }]
        );
        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(outcome.error, None);
        let frames = session.transport_mut().take_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].close_code(), Some(CloseCode::Normal));
    }

    #[test]
    fn test_read_error_after_data_still_closes() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        let transport = session.transport_mut();
        transport.push_frame(&Frame::text(r#"{"type":"led_query","id":0,"value":0}"#).unwrap());
        transport.read_error = Some(TransportError::Reset);
        let outcome = session.poll(1, &mut net);

        assert_eq!(drain_hw(&mut hw), [ApplicationMessage::LedQuery]);
        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(
            outcome.error,
            Some(SessionError::Transport(TransportError::Reset))
        );
    }

    #[test]
    fn test_write_error_closes() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        hw.outbound
            .try_send(ApplicationMessage::Heartbeat { seq: 7 })
            .unwrap();
        session.transport_mut().write_error = Some(TransportError::Io);
        let outcome = session.poll(1, &mut net);

        assert_eq!(outcome.previous, SessionState::Open);
        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(outcome.error, Some(SessionError::Transport(TransportError::Io)));
        assert!(session.transport().outgoing.is_empty());
    }

    #[test]
    fn test_full_inbound_counts_drops() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut session = open_session(&config(), &mut net);

        for _ in 0..crate::bridge::BRIDGE_CAPACITY + 2 {
            session
                .transport_mut()
                .push_frame(&Frame::text(r#"{"type":"led_query","id":0,"value":0}"#).unwrap());
        }
        // More than one receive buffer's worth
        session.poll(1, &mut net);
        session.poll(2, &mut net);

        assert_eq!(session.stats().messages_in as usize, crate::bridge::BRIDGE_CAPACITY + 2);
        assert_eq!(session.stats().dropped_inbound, 2);
        assert_eq!(session.state(), SessionState::Open);
    }
}
