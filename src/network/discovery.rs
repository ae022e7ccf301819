//! LAN Discovery
//!
//! The host broadcasts an [`Offer`] on a fixed interval from a
//! background task. The player listens on the well-known port and takes
//! the first datagram that decodes; everything else on the broadcast
//! domain is noise and is dropped without failing.
//!
//! Seekers share the port: several players on one machine can listen
//! for offers at the same time.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::protocol::{Offer, WireMessage};
use super::server::shutdown_signalled;

/// Largest datagram the seeker reads.
const RECV_BUFFER: usize = 1024;

/// Discovery socket failures. Undecodable datagrams are never errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Could not bind the UDP socket.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Socket failure after binding.
    #[error("discovery socket error: {0}")]
    Io(#[from] io::Error),
}

/// A host that answered discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHost {
    /// TCP endpoint: the datagram's source IP and the advertised port.
    pub addr: SocketAddr,
    /// Advertised host name.
    pub name: String,
}

/// Bind the player's listening socket with address and port reuse, so
/// other seekers can hold the same port.
pub async fn bind_seeker(addr: SocketAddr) -> Result<UdpSocket, DiscoveryError> {
    let socket = bind_shared(addr).map_err(|source| DiscoveryError::Bind { addr, source })?;
    info!(addr = %socket.local_addr()?, "listening for offers");
    Ok(socket)
}

fn bind_shared(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Seeker on every interface at `port`.
pub async fn bind_seeker_port(port: u16) -> Result<UdpSocket, DiscoveryError> {
    bind_seeker(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
}

/// Wait for the first valid offer.
pub async fn seek_offer(socket: &UdpSocket) -> Result<DiscoveredHost, DiscoveryError> {
    let mut buf = [0u8; RECV_BUFFER];

    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;

        match Offer::decode(&buf[..len]) {
            Ok(offer) => {
                let addr = SocketAddr::new(from.ip(), offer.port);
                info!(%addr, name = %offer.name, "received offer");
                return Ok(DiscoveredHost {
                    addr,
                    name: offer.name,
                });
            }
            Err(e) => {
                debug!(%from, len, error = %e, "discarding datagram");
            }
        }
    }
}

/// Periodic offer sender.
pub struct OfferBroadcaster {
    socket: UdpSocket,
    target: SocketAddr,
    packet: Bytes,
    period: Duration,
}

impl OfferBroadcaster {
    /// Bind an ephemeral broadcast-enabled socket that will send `offer`
    /// to `target` every `period`.
    pub async fn bind(offer: &Offer, target: SocketAddr, period: Duration) -> Result<Self, DiscoveryError> {
        let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| DiscoveryError::Bind { addr: local, source })?;
        socket.set_broadcast(true)?;

        Ok(Self {
            socket,
            target,
            packet: offer.encode(),
            period,
        })
    }

    /// Send once per period until `shutdown` turns true. Send failures
    /// are logged and the loop carries on.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        info!(dest = %self.target, period = ?self.period, "broadcasting offers");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.socket.send_to(&self.packet, self.target).await {
                        warn!(dest = %self.target, error = %e, "offer broadcast failed");
                    }
                }
                _ = shutdown_signalled(&mut shutdown) => {
                    debug!("offer broadcaster stopping");
                    break;
                }
            }
        }
    }
}
