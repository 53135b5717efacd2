use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Run the init command
pub fn run(config_path: &Path) -> Result<()> {
    if Config::exists(config_path) {
        bail!(
            "Config already exists at {}\nUse a different --config path or delete the existing config.",
            config_path.display()
        );
    }

    let config = Config::default();
    config.save(config_path)?;

    info!("Config initialized at {}", config_path.display());
    println!("Config saved to: {}", config_path.display());
    println!("\nDefaults:");
    println!("  registry  {}:{}", config.network.host, config.network.registry_port);
    println!("  relays    port {} + node id", config.network.base_relay_port);
    println!("  users     port {} + user id", config.network.base_user_port);
    println!("  circuit   {} hops", config.circuit.length);
    println!("\nNext steps:");
    println!("  1. Run 'shallot launch' to start a local network");
    println!("  2. Run 'shallot send --from 0 --to 1 --message \"hello\"'");

    Ok(())
}
