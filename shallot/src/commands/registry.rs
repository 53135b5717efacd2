use anyhow::Result;
use shl_directory::NodeRegistry;
use std::sync::Arc;

use super::{bind, block_on, run_until_shutdown};
use crate::config::Config;
use crate::rpc::serve_registry;

/// Run the node directory
pub fn run(config: &Config) -> Result<()> {
    block_on(async {
        let listener = bind(&config.network.host, config.network.registry_port).await?;
        println!("Node directory starting. Press Ctrl+C to stop.");
        run_until_shutdown(serve_registry(listener, Arc::new(NodeRegistry::new()))).await
    })
}
