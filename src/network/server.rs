//! Table Server
//!
//! Accept loop for the host. Spawns the offer broadcaster once, then one
//! task per accepted connection running a [`HostSession`]. Sessions share
//! nothing but the bookkeeping map used for connection limits.

use std::collections::BTreeMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock};
use tracing::{error, info, instrument, warn};

use crate::network::discovery::{DiscoveryError, OfferBroadcaster};
use crate::network::protocol::Offer;
use crate::network::session::{
    short_id, HostSession, SessionConfig, SessionId, ShuffledDecks,
};
use crate::{BROADCAST_INTERVAL, DISCOVERY_PORT, HOST_RECV_TIMEOUT};

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// TCP bind address. Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,
    /// Name advertised in offers.
    pub host_name: String,
    /// UDP port offers are sent to.
    pub discovery_port: u16,
    /// Destination address for offers.
    pub broadcast_addr: Ipv4Addr,
    /// Time between offers.
    pub broadcast_interval: Duration,
    /// Per-read deadline inside a session.
    pub recv_timeout: Duration,
    /// Maximum concurrent sessions.
    pub max_connections: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            host_name: "CasinoRoyaleServer".to_string(),
            discovery_port: DISCOVERY_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
            broadcast_interval: BROADCAST_INTERVAL,
            recv_timeout: HOST_RECV_TIMEOUT,
            max_connections: 64,
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `BLACKJACK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `var` returns for each key.
    /// Unparsable values keep the default.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: parse_var(&var, "BLACKJACK_BIND_ADDR").unwrap_or(defaults.bind_addr),
            host_name: var("BLACKJACK_HOST_NAME").unwrap_or(defaults.host_name),
            discovery_port: parse_var(&var, "BLACKJACK_DISCOVERY_PORT").unwrap_or(defaults.discovery_port),
            recv_timeout: parse_var(&var, "BLACKJACK_RECV_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.recv_timeout),
            ..defaults
        }
    }

    /// Where offers are sent.
    pub fn broadcast_target(&self) -> SocketAddr {
        SocketAddr::from((self.broadcast_addr, self.discovery_port))
    }
}

fn parse_var<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.parse().ok())
}

/// Resolves once the flag behind `rx` is true, or once the sender is gone.
pub(crate) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Table server errors.
#[derive(Debug, thiserror::Error)]
pub enum TableServerError {
    /// Failed to bind the TCP listener.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] io::Error),

    /// Offer broadcaster could not start.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Bookkeeping for a live connection.
struct ConnectedClient {
    /// Session serving this connection.
    session_id: SessionId,
    /// When the connection was accepted.
    connected_at: Instant,
}

/// The table server.
pub struct TableServer {
    /// Server configuration.
    config: HostConfig,
    /// Bound gameplay listener.
    listener: TcpListener,
    /// Live connections.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown flag; stays true once set.
    shutdown_tx: watch::Sender<bool>,
}

impl TableServer {
    /// Bind the gameplay listener.
    pub async fn bind(config: HostConfig) -> Result<Self, TableServerError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_tx, _) = watch::channel(false);

        info!("Table server listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        })
    }

    /// Bound gameplay address; its port goes into every offer.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Server configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Live connections.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Stop accepting, stop broadcasting, and drop every live session.
    /// Takes effect even if [`TableServer::run`] has not started yet.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Broadcast offers and serve connections until [`TableServer::shutdown`].
    #[instrument(skip(self), fields(name = %self.config.host_name))]
    pub async fn run(&self) -> Result<(), TableServerError> {
        let offer = Offer {
            port: self.local_addr()?.port(),
            name: self.config.host_name.clone(),
        };
        let broadcaster = OfferBroadcaster::bind(
            &offer,
            self.config.broadcast_target(),
            self.config.broadcast_interval,
        )
        .await?;
        let broadcast_handle = tokio::spawn(broadcaster.run(self.shutdown_tx.subscribe()));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr).await;
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_signalled(&mut shutdown_rx) => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        let _ = broadcast_handle.await;
        Ok(())
    }

    /// Register the connection and spawn its session.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let session_config = SessionConfig {
            recv_timeout: self.config.recv_timeout,
        };
        let session = HostSession::new(stream, &session_config, ShuffledDecks::from_entropy());
        let session_id = session.id();

        self.clients.write().await.insert(
            addr,
            ConnectedClient {
                session_id,
                connected_at: Instant::now(),
            },
        );

        let clients = self.clients.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                result = session.run() => {
                    if let Err(e) = result {
                        if e.is_protocol_violation() {
                            warn!("Protocol violation from {}: {}", addr, e);
                        } else if e.is_timeout() {
                            info!("Session for {} timed out", addr);
                        }
                    }
                }
                _ = shutdown_signalled(&mut shutdown_rx) => {
                    info!("Dropping session {} for {} on shutdown", short_id(&session_id), addr);
                }
            }

            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    "Connection {} closed (session {}, {:?})",
                    addr,
                    short_id(&client.session_id),
                    client.connected_at.elapsed()
                );
            }
        });
    }
}
