//! Blackjack Table Host
//!
//! Advertises the table on the LAN and deals to every player that
//! connects until interrupted.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blackjack_table::{
    network::{HostConfig, TableServer},
    DEALER_STAND_SCORE, MAGIC_COOKIE, RESHUFFLE_THRESHOLD, VERSION,
};

#[derive(Parser)]
#[command(version, about = "Host a LAN blackjack table")]
struct HostArgs {
    /// Name advertised in offers.
    #[arg(long)]
    name: Option<String>,

    /// TCP bind address (port 0 picks one).
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// UDP port offers are sent to.
    #[arg(long)]
    discovery_port: Option<u16>,

    /// Destination address for offers.
    #[arg(long)]
    broadcast_addr: Option<Ipv4Addr>,

    /// Seconds to wait for a player decision.
    #[arg(long)]
    recv_timeout: Option<u64>,

    /// Maximum concurrent players.
    #[arg(long)]
    max_connections: Option<usize>,
}

impl HostArgs {
    fn into_config(self) -> HostConfig {
        let mut config = HostConfig::from_env();
        if let Some(name) = self.name {
            config.host_name = name;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(port) = self.discovery_port {
            config.discovery_port = port;
        }
        if let Some(addr) = self.broadcast_addr {
            config.broadcast_addr = addr;
        }
        if let Some(secs) = self.recv_timeout {
            config.recv_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HostArgs::parse().into_config();

    info!("Blackjack Table Host v{}", VERSION);
    info!("Magic cookie: {:#010x}", MAGIC_COOKIE);
    info!("Dealer stands on {}, reshuffle below {} cards", DEALER_STAND_SCORE, RESHUFFLE_THRESHOLD);

    let server = Arc::new(
        TableServer::bind(config)
            .await
            .context("failed to start table server")?,
    );
    info!(
        "Offering {} on udp/{} every {:?}",
        server.local_addr()?,
        server.config().discovery_port,
        server.config().broadcast_interval
    );

    let runner = server.clone();
    let mut handle = tokio::spawn(async move { runner.run().await });

    tokio::select! {
        result = &mut handle => {
            result?.context("table server failed")?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("Interrupted, shutting down");
            server.shutdown();
        }
    }

    handle.await?.context("table server failed")?;
    Ok(())
}
