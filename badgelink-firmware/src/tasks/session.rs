//! Websocket session task
//!
//! Listens on the bridge port, hands each accepted socket to the acceptor
//! and polls the session until it releases the socket. While nobody is
//! connected the acceptor discards stale outbound messages.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Ticker, Timer};
use static_cell::StaticCell;

use badgelink_core::session::SessionStats;
use badgelink_core::{Acceptor, AcceptorPoll, BridgeConfig, Busy, NetworkPort};
use badgelink_protocol::JsonCodec;

use crate::channels;
use crate::now_ms;
use crate::transport::TcpTransport;

/// Socket buffer size per direction
const SOCKET_BUFFER: usize = 2048;

/// Session poll period while connected
const NET_POLL: Duration = Duration::from_millis(5);

/// Outbound discard period while idle
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Delay after a failed accept
const ACCEPT_RETRY: Duration = Duration::from_millis(200);

/// Time allowed for the FIN to go out before the socket is reset
const LINGER: Duration = Duration::from_millis(500);

type BadgeAcceptor = Acceptor<TcpTransport, JsonCodec>;

static RX_BUFFER: StaticCell<[u8; SOCKET_BUFFER]> = StaticCell::new();
static TX_BUFFER: StaticCell<[u8; SOCKET_BUFFER]> = StaticCell::new();

#[embassy_executor::task]
pub async fn session_task(
    stack: Stack<'static>,
    config: &'static BridgeConfig,
    mut port: NetworkPort<'static>,
) {
    let mut socket = TcpSocket::new(
        stack,
        RX_BUFFER.init([0; SOCKET_BUFFER]),
        TX_BUFFER.init([0; SOCKET_BUFFER]),
    );
    let mut acceptor: BadgeAcceptor = Acceptor::new(config.clone(), JsonCodec);

    loop {
        stack.wait_config_up().await;
        info!("Listening on port {} path {}", config.port, config.path.as_str());

        let discard_stale = async {
            let mut ticker = Ticker::every(IDLE_POLL);
            loop {
                ticker.next().await;
                if let AcceptorPoll::Idle { discarded } = acceptor.poll(now_ms(), &mut port) {
                    if discarded > 0 {
                        trace!("Discarded {} outbound messages with no client", discarded);
                    }
                }
            }
        };
        // The discard loop never finishes, so only the accept side resolves
        let Either::First(accepted) = select(socket.accept(config.port), discard_stale).await
        else {
            continue;
        };

        if let Err(e) = accepted {
            warn!("Accept error: {:?}", e);
            socket.abort();
            Timer::after(ACCEPT_RETRY).await;
            continue;
        }

        info!("Client connected: {:?}", socket.remote_endpoint());
        channels::set_session_active(true);

        socket = match acceptor.offer(TcpTransport::new(socket), now_ms()) {
            Ok(()) => run_session(&mut acceptor, &mut port).await,
            Err(Busy(transport)) => {
                warn!("Session slot unexpectedly busy");
                transport.into_socket()
            }
        };

        socket.close();
        if with_timeout(LINGER, socket.flush()).await.is_err() {
            debug!("Socket flush timed out");
        }
        socket.abort();
        channels::set_session_active(false);
        info!("Sessions served: {}", acceptor.sessions_served());
    }
}

/// Poll the active session until it closes, returning its socket
async fn run_session(
    acceptor: &mut BadgeAcceptor,
    port: &mut NetworkPort<'static>,
) -> TcpSocket<'static> {
    let mut ticker = Ticker::every(NET_POLL);
    loop {
        match acceptor.poll(now_ms(), port) {
            AcceptorPoll::Active(outcome) => {
                if outcome.changed() {
                    info!("Session {:?} -> {:?}", outcome.previous, outcome.state);
                }
                if let Some(e) = outcome.error {
                    warn!("Session error: {:?}", e);
                }
            }
            AcceptorPoll::Released {
                transport,
                outcome,
                stats,
            } => {
                if let Some(e) = outcome.error {
                    warn!("Session ended with error: {:?}", e);
                }
                log_stats(&stats);
                return transport.into_socket();
            }
            // The slot stays occupied until the session is released
            AcceptorPoll::Idle { .. } => {}
        }
        ticker.next().await;
    }
}

fn log_stats(stats: &SessionStats) {
    info!(
        "Session closed: frames {}/{} messages {}/{} dropped={} codec_errors={} pings={}",
        stats.frames_in,
        stats.frames_out,
        stats.messages_in,
        stats.messages_out,
        stats.dropped_inbound,
        stats.codec_errors,
        stats.pings_answered
    );
}
