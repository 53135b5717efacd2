// Copyright (c) 2024 Botho Foundation

//! User node: sends through circuits and receives into an inbox.

use parking_lot::RwLock;
use shl_directory::{DirectoryError, NodeDirectory};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::network::onion::{
    import_candidates, select_circuit, wrap_message, CircuitError, Inbox, NodeId, UserId,
};
use crate::network::transport::{HopTransport, TransportError};

/// Errors that can occur while sending a message.
#[derive(Debug, Error)]
pub enum SendError {
    /// The relay list could not be fetched.
    #[error("node directory: {0}")]
    Directory(#[from] DirectoryError),

    /// No circuit could be built or wrapped.
    #[error("circuit: {0}")]
    Circuit(#[from] CircuitError),

    /// The entry relay did not accept the envelope.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

/// A user endpoint.
pub struct UserNode {
    user_id: UserId,
    inbox: Arc<Inbox>,
    directory: Arc<dyn NodeDirectory>,
    transport: Arc<dyn HopTransport>,
    circuit_length: usize,
    last_sent: RwLock<Option<String>>,
    last_circuit: RwLock<Option<Vec<NodeId>>>,
}

impl UserNode {
    /// Create a user that picks `circuit_length` relays per message.
    pub fn new(
        user_id: UserId,
        directory: Arc<dyn NodeDirectory>,
        transport: Arc<dyn HopTransport>,
        circuit_length: usize,
    ) -> Self {
        Self {
            user_id,
            inbox: Arc::new(Inbox::new(user_id)),
            directory,
            transport,
            circuit_length,
            last_sent: RwLock::new(None),
            last_circuit: RwLock::new(None),
        }
    }

    /// This user's id.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// This user's inbox.
    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    /// Last message this user sent.
    pub fn last_sent_message(&self) -> Option<String> {
        self.last_sent.read().clone()
    }

    /// Relays used for the last message, entry first.
    pub fn last_circuit(&self) -> Option<Vec<NodeId>> {
        self.last_circuit.read().clone()
    }

    /// Send `message` to `destination` through a fresh random circuit.
    ///
    /// Returns the circuit's node ids, entry first. One attempt only: a
    /// failure anywhere is reported, never rerouted.
    pub async fn send_message(&self, message: &str, destination: UserId) -> Result<Vec<NodeId>, SendError> {
        let entries = self.directory.list_nodes().await?;
        let candidates = import_candidates(&entries);

        let (node_ids, wrapped) = {
            let mut rng = rand::thread_rng();
            let circuit = select_circuit(&candidates, self.circuit_length, &mut rng)?;
            let wrapped = wrap_message(&circuit, destination, message.as_bytes(), &mut rng)?;
            (circuit.node_ids(), wrapped)
        };

        *self.last_sent.write() = Some(message.to_string());
        *self.last_circuit.write() = Some(node_ids.clone());

        self.transport.forward(wrapped.entry, &wrapped.envelope).await?;
        info!(
            "User {} sent message to user {} via entry relay {}",
            self.user_id, destination, wrapped.entry
        );
        Ok(node_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::onion::{DeliveryError, Envelope, RelayIdentity};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shl_directory::NodeRegistry;

    #[derive(Default)]
    struct CapturingTransport {
        forwarded: Mutex<Vec<NodeId>>,
    }

    #[async_trait]
    impl HopTransport for CapturingTransport {
        async fn forward(&self, to: NodeId, _envelope: &Envelope) -> Result<(), TransportError> {
            self.forwarded.lock().push(to);
            Ok(())
        }

        async fn deliver(&self, to: UserId, _plaintext: &[u8]) -> Result<(), DeliveryError> {
            Err(DeliveryError::UnknownUser(to))
        }
    }

    fn registry_with(count: u32) -> Arc<NodeRegistry> {
        let registry = Arc::new(NodeRegistry::new());
        let mut rng = rand::thread_rng();
        for id in 0..count {
            let identity = RelayIdentity::generate(NodeId(id), &mut rng);
            registry.register(identity.registration()).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_send_records_circuit() {
        let transport = Arc::new(CapturingTransport::default());
        let user = UserNode::new(UserId(0), registry_with(5), transport.clone(), 3);

        let circuit = user.send_message("hello", UserId(1)).await.unwrap();
        assert_eq!(circuit.len(), 3);
        assert_eq!(user.last_circuit(), Some(circuit.clone()));
        assert_eq!(user.last_sent_message().as_deref(), Some("hello"));
        assert_eq!(transport.forwarded.lock().as_slice(), &[circuit[0]]);
    }

    #[tokio::test]
    async fn test_send_fails_without_enough_relays() {
        let transport = Arc::new(CapturingTransport::default());
        let user = UserNode::new(UserId(0), registry_with(2), transport.clone(), 3);

        let err = user.send_message("hello", UserId(1)).await.unwrap_err();
        assert!(matches!(
            err,
            SendError::Circuit(CircuitError::InsufficientNodes {
                needed: 3,
                available: 2
            })
        ));
        assert!(transport.forwarded.lock().is_empty());
        assert_eq!(user.last_sent_message(), None);
    }
}
