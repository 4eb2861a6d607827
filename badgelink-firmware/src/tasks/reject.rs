//! Busy rejector
//!
//! While a session occupies the slot, a second socket listens on the same
//! port and answers every connection with `503 Service Unavailable`, so a
//! second browser tab gets a clear refusal instead of a hanging connect.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write;
use static_cell::StaticCell;

use badgelink_protocol::handshake::{error_response, HandshakeError};

use crate::channels::SESSION_ACTIVE;

/// Time allowed to read the request and write the response
const REJECT_TIMEOUT: Duration = Duration::from_secs(2);

static RX_BUFFER: StaticCell<[u8; 512]> = StaticCell::new();
static TX_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();

#[embassy_executor::task]
pub async fn reject_task(stack: Stack<'static>, port: u16) {
    let response = match error_response(HandshakeError::Busy) {
        Ok(response) => response,
        Err(_) => {
            error!("Busy response does not fit its buffer");
            return;
        }
    };

    let Some(mut session) = SESSION_ACTIVE.receiver() else {
        error!("No receiver left for the session flag");
        return;
    };

    let mut socket = TcpSocket::new(stack, RX_BUFFER.init([0; 512]), TX_BUFFER.init([0; 256]));
    socket.set_timeout(Some(REJECT_TIMEOUT));

    loop {
        stack.wait_config_up().await;
        session.get_and(|active| *active).await;

        match select(socket.accept(port), session.get_and(|active| !*active)).await {
            Either::First(Ok(())) => {
                // Read whatever request arrived so the client sees the response
                let mut scratch = [0u8; 256];
                let _ = with_timeout(REJECT_TIMEOUT, socket.read(&mut scratch)).await;

                match socket.write_all(response.as_bytes()).await {
                    Ok(()) => {
                        let _ = socket.flush().await;
                        info!("Rejected client {:?}: session busy", socket.remote_endpoint());
                    }
                    Err(e) => warn!("Busy response write failed: {:?}", e),
                }
                socket.close();
            }
            Either::First(Err(e)) => warn!("Reject accept error: {:?}", e),
            Either::Second(_) => {}
        }
        socket.abort();
    }
}
