use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

use super::{bind, block_on, run_until_shutdown};
use crate::config::Config;
use crate::network::onion::UserId;
use crate::network::{AddressResolver, DirectoryClient, HttpTransport, PortLayout};
use crate::node::UserNode;
use crate::rpc::serve_user;

/// Run a single user endpoint
pub fn run(config: &Config, id: u32) -> Result<()> {
    let config = config.clone();
    block_on(async move {
        let (listener, user) = start(&config, UserId(id)).await?;
        println!("User {} starting. Press Ctrl+C to stop.", id);
        run_until_shutdown(serve_user(listener, user)).await
    })
}

/// Bind the user's port and wire it to the directory and relays.
pub(crate) async fn start(config: &Config, user_id: UserId) -> Result<(TcpListener, Arc<UserNode>)> {
    let layout = PortLayout::from(&config.network);
    let timeout = config.network.request_timeout();

    let port = layout
        .user_port(user_id)
        .with_context(|| format!("No port available for user {}", user_id))?;
    let listener = bind(&layout.host, port).await?;

    let directory = DirectoryClient::new(layout.registry_url(), timeout)?;
    let resolver: Arc<dyn AddressResolver> = Arc::new(layout);
    let transport = HttpTransport::new(resolver, timeout)?;

    let user = UserNode::new(
        user_id,
        Arc::new(directory),
        Arc::new(transport),
        config.circuit.length,
    );
    Ok((listener, Arc::new(user)))
}
