use anyhow::{Context, Result};
use shl_directory::NodeRegistry;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::info;

use super::{bind, block_on, relay, user};
use crate::config::Config;
use crate::network::onion::{NodeId, UserId};
use crate::network::{AddressResolver, DirectoryClient, PortLayout};
use crate::rpc::{serve_registry, serve_relay, serve_user};

/// Run a registry, `relay_count` relays and `user_count` users in one process
pub fn run(config: &Config, relay_count: u32, user_count: u32) -> Result<()> {
    let config = config.clone();
    block_on(async move {
        let layout = Arc::new(PortLayout::from(&config.network));
        let timeout = config.network.request_timeout();
        let mut servers = JoinSet::new();

        let registry_listener = bind(&layout.host, layout.registry_port).await?;
        servers.spawn(serve_registry(registry_listener, Arc::new(NodeRegistry::new())));

        let directory = DirectoryClient::new(layout.registry_url(), timeout)?;
        for id in 0..relay_count {
            let (listener, router) = relay::start(layout.clone(), timeout, NodeId(id), &directory).await?;
            servers.spawn(serve_relay(listener, router, layout.clone()));
        }

        for id in 0..user_count {
            let (listener, user) = user::start(&config, UserId(id)).await?;
            servers.spawn(serve_user(listener, user));
        }

        info!("Launched {} relays and {} users", relay_count, user_count);
        println!("Network running. Press Ctrl+C to stop.");
        println!("  registry  {}", layout.registry_url());
        if let (Some(first), Some(last)) = (
            layout.relay_port(NodeId(0)),
            layout.relay_port(NodeId(relay_count.saturating_sub(1))),
        ) {
            println!("  relays    ports {}-{}", first, last);
        }
        if let (Some(first), Some(last)) = (
            layout.user_port(UserId(0)),
            layout.user_port(UserId(user_count.saturating_sub(1))),
        ) {
            println!("  users     ports {}-{}", first, last);
        }

        tokio::select! {
            Some(result) = servers.join_next() => {
                result
                    .context("Server task panicked")?
                    .context("Server stopped")
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                Ok(())
            }
        }
    })
}
