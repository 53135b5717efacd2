use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shallot::{commands, config};

#[derive(Parser)]
#[command(name = "shallot")]
#[command(about = "An onion-routing overlay of relays and users", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.shallot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,

    /// Run the node directory
    Registry,

    /// Run an onion router
    Relay {
        /// Node id; also selects the port (base_relay_port + id)
        #[arg(long)]
        id: u32,
    },

    /// Run a user endpoint
    User {
        /// User id; also selects the port (base_user_port + id)
        #[arg(long)]
        id: u32,
    },

    /// Run a registry, relays and users in one process
    Launch {
        /// Number of relays (default from config)
        #[arg(long)]
        relays: Option<u32>,

        /// Number of users (default from config)
        #[arg(long)]
        users: Option<u32>,
    },

    /// Ask a running user to send a message through a circuit
    Send {
        /// Sending user id
        #[arg(long)]
        from: u32,

        /// Destination user id
        #[arg(long)]
        to: u32,

        /// Message text
        #[arg(long)]
        message: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the level picked by --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = match cli.config {
        Some(path) => PathBuf::from(path),
        None => config::default_config_path()?,
    };

    let load_config = || config::Config::load_or_default(&config_path);

    match cli.command {
        Commands::Init => commands::init::run(&config_path),
        Commands::Registry => commands::registry::run(&load_config()?),
        Commands::Relay { id } => commands::relay::run(&load_config()?, id),
        Commands::User { id } => commands::user::run(&load_config()?, id),
        Commands::Launch { relays, users } => {
            let config = load_config()?;
            commands::launch::run(
                &config,
                relays.unwrap_or(config.launch.relay_count),
                users.unwrap_or(config.launch.user_count),
            )
        }
        Commands::Send { from, to, message } => {
            commands::send::run(&load_config()?, from, to, message)
        }
    }
}
