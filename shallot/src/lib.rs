// Copyright (c) 2024 Botho Foundation

//! Shallot node library - an onion-routing overlay.
//!
//! A sender picks a random circuit of relays from the node directory and
//! nests one encrypted layer per relay. Each relay peels exactly one layer,
//! learning only the next hop, and the last relay delivers the plaintext to
//! the destination user.
//!
//! - [`network::onion`]: circuit selection, layered encryption, relay
//!   peeling and the destination inbox
//! - [`network::transport`]: hop-to-hop transports (HTTP and in-process)
//! - [`node`]: onion router and user roles
//! - [`rpc`]: HTTP services for the registry, relays and users
//! - [`config`]: TOML configuration

#![deny(clippy::print_stdout)]

pub mod config;
pub mod network;
pub mod node;
pub mod rpc;

// Re-export commands module for CLI binary
pub mod commands;
