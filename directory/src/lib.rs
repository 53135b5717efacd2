// Copyright (c) 2024 Botho Foundation

//! Relay node directory for Shallot.
//!
//! The directory holds one `{nodeId, pubKey}` record per relay. Relays
//! register themselves on start-up; senders list every record and treat the
//! result as the candidate pool for circuit selection.
//!
//! - [`NodeDirectory`]: the read/write contract the onion core depends on
//! - [`NodeRegistry`]: in-memory implementation that serializes
//!   registrations
//! - [`messages`]: JSON wire types shared by the HTTP server and client

#![deny(missing_docs)]

pub mod messages;
mod store;

pub use messages::{DirectoryEntry, GetNodeRegistryBody, NodeId, RegisterNodeBody};
pub use store::NodeRegistry;

use async_trait::async_trait;
use displaydoc::Display;
use thiserror::Error;

/// Errors returned by a node directory.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum DirectoryError {
    /// Missing nodeId or pubKey
    MissingField,

    /// Node {0} is already registered
    DuplicateNode(NodeId),

    /// Directory unavailable: {0}
    Unavailable(String),
}

/// Read/write contract of a node directory.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Register a relay's public key under its node id.
    async fn register_node(&self, body: RegisterNodeBody) -> Result<DirectoryEntry, DirectoryError>;

    /// List every registered relay.
    async fn list_nodes(&self) -> Result<Vec<DirectoryEntry>, DirectoryError>;
}
