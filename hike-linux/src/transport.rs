//! LAN stand-in for the radio: UDP multicast, TTL 1. Every payload goes to every device
//! on the segment; delivery and ordering are not guaranteed.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hike_core::OutboundAction;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::node::{self, SharedCore};

const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 42, 99);
const MAX_DATAGRAM: usize = 1500;

pub async fn make_multicast_socket(port: u16) -> std::io::Result<UdpSocket> {
    let std_sock = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
    std_sock.join_multicast_v4(&MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED)?;
    std_sock.set_multicast_ttl_v4(1)?;
    std_sock.set_nonblocking(true)?;
    UdpSocket::from_std(std_sock)
}

pub fn group_addr(port: u16) -> SocketAddr {
    SocketAddr::from((MULTICAST_GROUP, port))
}

/// Push every datagram into the bounded receive queue. A full queue drops the datagram.
pub async fn recv_loop(socket: Arc<UdpSocket>, rx_tx: mpsc::Sender<Vec<u8>>) -> std::io::Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (n, from) = socket.recv_from(&mut buf).await?;
        trace!(%from, len = n, "datagram received");
        match rx_tx.try_send(buf[..n].to_vec()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(%from, "receive queue full, dropping payload")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Ok(()),
        }
    }
}

/// Periodic broadcast of own status plus carried records. Send failures are logged only;
/// the next cycle resends current state.
pub async fn broadcast_loop(
    socket: Arc<UdpSocket>,
    core: SharedCore,
    dest: SocketAddr,
    interval: Duration,
    started: Instant,
    persist_tx: mpsc::UnboundedSender<OutboundAction>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let actions = core.lock().await.tick(started.elapsed());
        for action in actions {
            match action {
                OutboundAction::Broadcast(payload) => {
                    if let Err(e) = socket.send_to(&payload, dest).await {
                        warn!(error = %e, "broadcast send failed");
                    } else {
                        trace!(len = payload.len(), "broadcast sent");
                    }
                }
                other => node::dispatch(other, &persist_tx),
            }
        }
    }
}
