//! Single-slot session acceptor
//!
//! At most one session exists at a time. A connection offered while the
//! slot is taken is handed back so the caller can refuse it.

use badgelink_protocol::MessageCodec;

use crate::bridge::NetworkPort;
use crate::config::BridgeConfig;
use crate::traits::Transport;

use super::connection::{PollOutcome, Session, SessionStats};

/// Connection refused because a session is already active
#[derive(Debug)]
pub struct Busy<T>(pub T);

/// Result of [`Acceptor::poll`]
#[derive(Debug)]
pub enum AcceptorPoll<T> {
    /// No session; `discarded` outbound messages had nobody to go to
    Idle { discarded: usize },
    /// The session ran one step and is still alive
    Active(PollOutcome),
    /// The session reached `Closed` and the slot is free again
    Released {
        transport: T,
        outcome: PollOutcome,
        stats: SessionStats,
    },
}

/// Owner of the session slot
pub struct Acceptor<T, C> {
    config: BridgeConfig,
    codec: C,
    slot: Option<Session<T, C>>,
    sessions_served: u32,
}

impl<T: Transport, C: MessageCodec + Clone> Acceptor<T, C> {
    pub fn new(config: BridgeConfig, codec: C) -> Self {
        Self {
            config,
            codec,
            slot: None,
            sessions_served: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_some()
    }

    /// Number of sessions started since boot
    pub fn sessions_served(&self) -> u32 {
        self.sessions_served
    }

    pub fn session(&self) -> Option<&Session<T, C>> {
        self.slot.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session<T, C>> {
        self.slot.as_mut()
    }

    /// Start a session on `transport`, or return it if the slot is taken
    pub fn offer(&mut self, transport: T, now_ms: u32) -> Result<(), Busy<T>> {
        if self.slot.is_some() {
            return Err(Busy(transport));
        }
        self.slot = Some(Session::new(
            transport,
            self.codec.clone(),
            &self.config,
            now_ms,
        ));
        self.sessions_served = self.sessions_served.wrapping_add(1);
        Ok(())
    }

    /// Step the active session, freeing the slot once it closes
    ///
    /// Outbound messages produced while no session is open are discarded so
    /// a new client never sees stale events.
    pub fn poll(&mut self, now_ms: u32, port: &mut NetworkPort<'_>) -> AcceptorPoll<T> {
        let Some(session) = self.slot.as_mut() else {
            return AcceptorPoll::Idle {
                discarded: port.outbound.discard_all(),
            };
        };

        let outcome = session.poll(now_ms, port);
        if !outcome.state.is_closed() {
            if !outcome.state.is_open() {
                port.outbound.discard_all();
            }
            return AcceptorPoll::Active(outcome);
        }

        port.outbound.discard_all();
        match self.slot.take() {
            Some(session) => {
                let stats = session.stats();
                AcceptorPoll::Released {
                    transport: session.into_transport(),
                    outcome,
                    stats,
                }
            }
            None => AcceptorPoll::Active(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::session::mock::{MockTransport, UPGRADE_REQUEST};
    use crate::session::{SessionError, SessionState};
    use crate::traits::TransportError;
    use badgelink_protocol::{ApplicationMessage, CloseCode, JsonCodec};

    fn acceptor() -> Acceptor<MockTransport, JsonCodec> {
        let config = BridgeConfig {
            idle_timeout_ms: 1_000,
            close_timeout_ms: 200,
            sync_on_connect: false,
            ..BridgeConfig::default()
        };
        Acceptor::new(config, JsonCodec)
    }

    fn upgrade_transport() -> MockTransport {
        let mut transport = MockTransport::new();
        transport.push_bytes(UPGRADE_REQUEST.as_bytes());
        transport
    }

    #[test]
    fn test_second_connection_is_busy() {
        let mut acceptor = acceptor();
        acceptor.offer(upgrade_transport(), 0).unwrap();

        let mut refused = MockTransport::new();
        refused.push_bytes(b"marker");
        let Err(Busy(returned)) = acceptor.offer(refused, 1) else {
            panic!("second offer accepted");
        };
        assert_eq!(returned.incoming.len(), 6);
        assert_eq!(acceptor.sessions_served(), 1);
    }

    #[test]
    fn test_idle_acceptor_discards_outbound() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut acceptor = acceptor();

        hw.outbound.try_send(ApplicationMessage::LedQuery).unwrap();
        hw.outbound
            .try_send(ApplicationMessage::Heartbeat { seq: 1 })
            .unwrap();

        let AcceptorPoll::Idle { discarded } = acceptor.poll(0, &mut net) else {
            panic!("expected idle");
        };
        assert_eq!(discarded, 2);
        assert!(hw.outbound.is_empty());
    }

    #[test]
    fn test_messages_wait_during_handshake_are_dropped() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut acceptor = acceptor();
        acceptor.offer(MockTransport::new(), 0).unwrap();

        hw.outbound
            .try_send(ApplicationMessage::Heartbeat { seq: 1 })
            .unwrap();
        let AcceptorPoll::Active(outcome) = acceptor.poll(1, &mut net) else {
            panic!("expected active");
        };
        assert_eq!(outcome.state, SessionState::Handshaking);
        assert!(net.outbound.is_empty());
    }

    #[test]
    fn test_slot_freed_after_idle_timeout() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut acceptor = acceptor();
        acceptor.offer(upgrade_transport(), 0).unwrap();

        assert!(matches!(
            acceptor.poll(0, &mut net),
            AcceptorPoll::Active(PollOutcome {
                state: SessionState::Open,
                ..
            })
        ));
        assert!(matches!(
            acceptor.poll(1_000, &mut net),
            AcceptorPoll::Active(PollOutcome {
                state: SessionState::Closing,
                ..
            })
        ));

        let AcceptorPoll::Released {
            mut transport,
            outcome,
            ..
        } = acceptor.poll(1_200, &mut net)
        else {
            panic!("expected release");
        };
        assert_eq!(outcome.state, SessionState::Closed);
        transport.take_response();
        let frames = transport.take_frames();
        assert_eq!(frames[0].close_code(), Some(CloseCode::GoingAway));

        assert!(!acceptor.is_busy());
        acceptor.offer(upgrade_transport(), 1_300).unwrap();
        assert_eq!(acceptor.sessions_served(), 2);
        assert!(matches!(
            acceptor.poll(1_300, &mut net),
            AcceptorPoll::Active(PollOutcome {
                state: SessionState::Open,
                ..
            })
        ));
    }

    #[test]
    fn test_write_error_frees_slot() {
        let mut bridge = Bridge::new();
        let (mut net, mut hw) = bridge.split();
        let mut acceptor = acceptor();
        acceptor.offer(upgrade_transport(), 0).unwrap();
        acceptor.poll(0, &mut net);

        if let Some(session) = acceptor.session_mut() {
            session.transport_mut().write_error = Some(TransportError::Io);
        }
        for seq in 0..3 {
            hw.outbound
                .try_send(ApplicationMessage::Heartbeat { seq })
                .unwrap();
        }

        let AcceptorPoll::Released { outcome, .. } = acceptor.poll(1, &mut net) else {
            panic!("expected release");
        };
        assert_eq!(outcome.state, SessionState::Closed);
        assert_eq!(outcome.error, Some(SessionError::Transport(TransportError::Io)));
        assert!(!acceptor.is_busy());
        assert!(hw.outbound.is_empty());
    }

    #[test]
    fn test_failed_handshake_releases_immediately() {
        let mut bridge = Bridge::new();
        let (mut net, _hw) = bridge.split();
        let mut acceptor = acceptor();

        let mut transport = MockTransport::new();
        transport.push_bytes(b"POST /ws HTTP/1.1\r\nHost: badge\r\n\r\n");
        acceptor.offer(transport, 0).unwrap();

        let AcceptorPoll::Released {
            mut transport,
            stats,
            ..
        } = acceptor.poll(0, &mut net)
        else {
            panic!("expected release");
        };
        assert!(transport
            .take_response()
            .starts_with("HTTP/1.1 405 Method Not Allowed"));
        assert_eq!(stats.frames_in, 0);
        assert!(!acceptor.is_busy());
    }
}
