// Copyright (c) 2024 Botho Foundation

//! Wire types for the node directory.
//!
//! Field names follow the directory's JSON API (`nodeId`, `pubKey`), which
//! relays and senders speak over HTTP.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory-assigned identifier of a relay node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// One registered relay: its id and its public key in text form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    /// The relay's node id.
    pub node_id: NodeId,
    /// The relay's public key, as exported text.
    pub pub_key: String,
}

/// Body of a registration request.
///
/// Both fields are optional on the wire so an incomplete request can be
/// parsed and rejected with a precise error instead of a parse failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeBody {
    /// The relay's node id.
    #[serde(default)]
    pub node_id: Option<NodeId>,
    /// The relay's public key text.
    #[serde(default)]
    pub pub_key: Option<String>,
}

impl RegisterNodeBody {
    /// Build a complete registration request.
    pub fn new(node_id: NodeId, pub_key: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id),
            pub_key: Some(pub_key.into()),
        }
    }
}

/// Response body listing every registered relay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNodeRegistryBody {
    /// Registered relays in registration order.
    pub nodes: Vec<DirectoryEntry>,
}
