//! CLI command implementations.
//!
//! These modules implement the user-facing CLI commands and legitimately
//! use stdout for output.

#![allow(clippy::print_stdout)]

pub mod init;
pub mod launch;
pub mod registry;
pub mod relay;
pub mod send;
pub mod user;

use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Run an async command to completion on a fresh runtime.
fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))
}

/// Run `server` until it fails or Ctrl+C is pressed.
async fn run_until_shutdown<F>(server: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = server => result.context("Server stopped"),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
