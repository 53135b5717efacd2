use anyhow::{Context, Result};
use shl_directory::NodeDirectory;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use super::{bind, block_on, run_until_shutdown};
use crate::config::Config;
use crate::network::onion::{NodeId, RelayIdentity};
use crate::network::{AddressResolver, DirectoryClient, HttpTransport, PortLayout};
use crate::node::{HopLog, OnionRouter};
use crate::rpc::serve_relay;

/// Run a single onion router
pub fn run(config: &Config, id: u32) -> Result<()> {
    let layout = Arc::new(PortLayout::from(&config.network));
    let timeout = config.network.request_timeout();

    block_on(async move {
        let directory = DirectoryClient::new(layout.registry_url(), timeout)?;
        let (listener, router) = start(layout.clone(), timeout, NodeId(id), &directory).await?;
        println!("Onion router {} starting. Press Ctrl+C to stop.", id);
        run_until_shutdown(serve_relay(listener, router, layout)).await
    })
}

/// Bind the relay's port, generate its keys and register it.
///
/// The port is bound before registering so the relay is reachable as soon
/// as senders can see it.
pub(crate) async fn start(
    layout: Arc<PortLayout>,
    timeout: Duration,
    node_id: NodeId,
    directory: &dyn NodeDirectory,
) -> Result<(TcpListener, Arc<OnionRouter>)> {
    let port = layout
        .relay_port(node_id)
        .with_context(|| format!("No port available for relay {}", node_id))?;
    let listener = bind(&layout.host, port).await?;

    let identity = RelayIdentity::generate(node_id, &mut rand::thread_rng());
    directory
        .register_node(identity.registration())
        .await
        .with_context(|| format!("Failed to register relay {}", node_id))?;
    info!("Relay {} registered with public key {:?}", node_id, identity.public_key());

    let resolver: Arc<dyn AddressResolver> = layout;
    let transport = Arc::new(HttpTransport::new(resolver, timeout)?);
    let router = Arc::new(OnionRouter::new(identity, transport, Arc::new(HopLog::new())));
    Ok((listener, router))
}
