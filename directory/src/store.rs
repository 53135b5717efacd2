// Copyright (c) 2024 Botho Foundation

//! In-memory relay registry.
//!
//! Registrations are serialized behind a write lock, so two concurrent
//! requests for the same `nodeId` can never both succeed. Entries live for
//! the lifetime of the process.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{DirectoryEntry, DirectoryError, NodeDirectory, NodeId, RegisterNodeBody};

/// Thread-safe in-memory node directory.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    /// Registered relays in registration order.
    entries: RwLock<Vec<DirectoryEntry>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relay.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::MissingField`] if `nodeId` is absent or `pubKey`
    ///   is absent or empty. Nothing is stored.
    /// - [`DirectoryError::DuplicateNode`] if the id is already registered.
    pub fn register(&self, body: RegisterNodeBody) -> Result<DirectoryEntry, DirectoryError> {
        let (node_id, pub_key) = match (body.node_id, body.pub_key) {
            (Some(node_id), Some(pub_key)) if !pub_key.is_empty() => (node_id, pub_key),
            _ => {
                debug!("Rejecting registration with missing fields");
                return Err(DirectoryError::MissingField);
            }
        };

        let mut entries = self.entries.write();
        if entries.iter().any(|entry| entry.node_id == node_id) {
            return Err(DirectoryError::DuplicateNode(node_id));
        }

        let entry = DirectoryEntry { node_id, pub_key };
        entries.push(entry.clone());
        info!(node_id = %node_id, "Node registered");
        Ok(entry)
    }

    /// All registered relays in registration order.
    pub fn list(&self) -> Vec<DirectoryEntry> {
        self.entries.read().clone()
    }

    /// Look up one relay.
    pub fn get(&self, node_id: NodeId) -> Option<DirectoryEntry> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.node_id == node_id)
            .cloned()
    }

    /// Number of registered relays.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no relay is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl NodeDirectory for NodeRegistry {
    async fn register_node(&self, body: RegisterNodeBody) -> Result<DirectoryEntry, DirectoryError> {
        self.register(body)
    }

    async fn list_nodes(&self) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        Ok(self.list())
    }
}
