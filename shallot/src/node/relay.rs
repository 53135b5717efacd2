// Copyright (c) 2024 Botho Foundation

//! Onion router: a relay process's envelope pipeline.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::network::onion::{
    Envelope, HopAddress, NodeId, PeeledLayer, RelayError, RelayForwarder, RelayIdentity,
    RelayMetrics, UserId,
};
use crate::network::transport::HopTransport;

/// What a relay did with an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Inner envelope handed to the next relay.
    Forwarded {
        /// The next relay
        to: NodeId,
    },
    /// Plaintext handed to the destination user.
    Delivered {
        /// The destination user
        to: UserId,
    },
}

#[derive(Debug, Default)]
struct HopRecord {
    encrypted: Option<String>,
    decrypted: Option<String>,
    destination: Option<HopAddress>,
}

/// Per-relay record of the most recent envelope.
///
/// Keeps the last envelope received, what it decrypted to, and where the
/// result went.
#[derive(Debug, Default)]
pub struct HopLog {
    record: RwLock<HopRecord>,
}

impl HopLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new record; fields from the previous envelope are dropped.
    fn record_received(&self, envelope: &Envelope) {
        *self.record.write() = HopRecord {
            encrypted: Some(envelope.as_str().to_string()),
            ..Default::default()
        };
    }

    fn record_peeled(&self, decrypted: String, destination: HopAddress) {
        let mut record = self.record.write();
        record.decrypted = Some(decrypted);
        record.destination = Some(destination);
    }

    /// Last envelope text received.
    pub fn last_received_encrypted(&self) -> Option<String> {
        self.record.read().encrypted.clone()
    }

    /// What the last accepted envelope decrypted to: the inner envelope
    /// text, or the plaintext at the last hop.
    pub fn last_received_decrypted(&self) -> Option<String> {
        self.record.read().decrypted.clone()
    }

    /// Where the last accepted envelope went.
    pub fn last_destination(&self) -> Option<HopAddress> {
        self.record.read().destination
    }
}

/// A relay: peels one layer per envelope and performs exactly one outbound
/// call with the result.
pub struct OnionRouter {
    forwarder: RelayForwarder,
    transport: Arc<dyn HopTransport>,
    log: Arc<HopLog>,
}

impl OnionRouter {
    /// Create a router for `identity` that sends through `transport` and
    /// records observations in `log`.
    pub fn new(identity: RelayIdentity, transport: Arc<dyn HopTransport>, log: Arc<HopLog>) -> Self {
        Self {
            forwarder: RelayForwarder::new(identity),
            transport,
            log,
        }
    }

    /// The relay's node id.
    pub fn node_id(&self) -> NodeId {
        self.forwarder.node_id()
    }

    /// The relay's identity.
    pub fn identity(&self) -> &RelayIdentity {
        self.forwarder.identity()
    }

    /// The relay's counters.
    pub fn metrics(&self) -> &RelayMetrics {
        self.forwarder.metrics()
    }

    /// The relay's observation log.
    pub fn log(&self) -> &HopLog {
        &self.log
    }

    /// Peel `envelope` and pass the result on.
    ///
    /// Rejected envelopes go nowhere. Downstream failures are returned
    /// as-is; there is no retry.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<RelayOutcome, RelayError> {
        self.log.record_received(&envelope);

        match self.forwarder.peel(&envelope)? {
            PeeledLayer::Relay { next_hop, envelope } => {
                self.log
                    .record_peeled(envelope.as_str().to_string(), HopAddress::Relay(next_hop));
                debug!("Relay {} forwarding to relay {}", self.node_id(), next_hop);
                if let Err(e) = self.transport.forward(next_hop, &envelope).await {
                    self.metrics().record_failed();
                    return Err(e.into());
                }
                self.metrics().record_forwarded();
                Ok(RelayOutcome::Forwarded { to: next_hop })
            }
            PeeledLayer::Final {
                destination,
                plaintext,
            } => {
                self.log.record_peeled(
                    String::from_utf8_lossy(&plaintext).into_owned(),
                    HopAddress::User(destination),
                );
                if let Err(e) = self.transport.deliver(destination, &plaintext).await {
                    self.metrics().record_failed();
                    return Err(e.into());
                }
                self.metrics().record_delivered();
                info!("Relay {} delivered to user {}", self.node_id(), destination);
                Ok(RelayOutcome::Delivered { to: destination })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::onion::{wrap_message, Circuit, DeliveryError};
    use crate::network::transport::TransportError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records outbound calls instead of making them.
    #[derive(Default)]
    struct RecordingTransport {
        forwarded: Mutex<Vec<(NodeId, Envelope)>>,
        delivered: Mutex<Vec<(UserId, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl HopTransport for RecordingTransport {
        async fn forward(&self, to: NodeId, envelope: &Envelope) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::UnknownRelay(to));
            }
            self.forwarded.lock().push((to, envelope.clone()));
            Ok(())
        }

        async fn deliver(&self, to: UserId, plaintext: &[u8]) -> Result<(), DeliveryError> {
            self.delivered.lock().push((to, plaintext.to_vec()));
            Ok(())
        }
    }

    fn router(id: u32, transport: Arc<RecordingTransport>) -> OnionRouter {
        let identity = RelayIdentity::generate(NodeId(id), &mut rand::thread_rng());
        OnionRouter::new(identity, transport, Arc::new(HopLog::new()))
    }

    #[tokio::test]
    async fn test_forward_records_and_sends_once() {
        let transport = Arc::new(RecordingTransport::default());
        let entry = router(1, transport.clone());
        let exit = RelayIdentity::generate(NodeId(2), &mut rand::thread_rng());
        let circuit = Circuit::new(vec![entry.identity().relay_node(), exit.relay_node()]).unwrap();
        let wrapped = wrap_message(&circuit, UserId(5), b"hello", &mut rand::thread_rng()).unwrap();

        let outcome = entry.handle_envelope(wrapped.envelope.clone()).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Forwarded { to: NodeId(2) });

        let forwarded = transport.forwarded.lock();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].0, NodeId(2));
        assert!(transport.delivered.lock().is_empty());

        let log = entry.log();
        assert_eq!(log.last_received_encrypted(), Some(wrapped.envelope.into_string()));
        assert_eq!(log.last_received_decrypted(), Some(forwarded[0].1.as_str().to_string()));
        assert_eq!(log.last_destination(), Some(HopAddress::Relay(NodeId(2))));
    }

    #[tokio::test]
    async fn test_final_hop_delivers() {
        let transport = Arc::new(RecordingTransport::default());
        let exit = router(3, transport.clone());
        let circuit = Circuit::new(vec![exit.identity().relay_node()]).unwrap();
        let wrapped = wrap_message(&circuit, UserId(0), b"attack at dawn", &mut rand::thread_rng()).unwrap();

        let outcome = exit.handle_envelope(wrapped.envelope).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Delivered { to: UserId(0) });
        assert_eq!(
            transport.delivered.lock().as_slice(),
            &[(UserId(0), b"attack at dawn".to_vec())]
        );
        assert_eq!(exit.log().last_received_decrypted().as_deref(), Some("attack at dawn"));
        assert_eq!(exit.log().last_destination(), Some(HopAddress::User(UserId(0))));
    }

    #[tokio::test]
    async fn test_rejected_envelope_goes_nowhere() {
        let transport = Arc::new(RecordingTransport::default());
        let relay = router(1, transport.clone());

        let err = relay
            .handle_envelope(Envelope::from_text("bm90IGFuIG9uaW9u"))
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(transport.forwarded.lock().is_empty());
        assert!(transport.delivered.lock().is_empty());
        assert_eq!(relay.log().last_received_encrypted().as_deref(), Some("bm90IGFuIG9uaW9u"));
        assert_eq!(relay.log().last_destination(), None);
        assert_eq!(relay.metrics().snapshot().envelopes_rejected, 1);
    }

    #[tokio::test]
    async fn test_downstream_failure_surfaces() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let entry = router(1, transport);
        let next = RelayIdentity::generate(NodeId(2), &mut rand::thread_rng());
        let circuit = Circuit::new(vec![entry.identity().relay_node(), next.relay_node()]).unwrap();
        let wrapped = wrap_message(&circuit, UserId(1), b"x", &mut rand::thread_rng()).unwrap();

        let err = entry.handle_envelope(wrapped.envelope).await.unwrap_err();
        assert!(matches!(err, RelayError::Forward(_)));
        assert!(!err.is_rejection());

        let snapshot = entry.metrics().snapshot();
        assert_eq!(snapshot.envelopes_received, 1);
        assert_eq!(snapshot.envelopes_forwarded, 0);
        assert_eq!(snapshot.envelopes_failed, 1);
    }

    #[tokio::test]
    async fn test_rejection_clears_previous_record() {
        let transport = Arc::new(RecordingTransport::default());
        let exit = router(4, transport.clone());
        let circuit = Circuit::new(vec![exit.identity().relay_node()]).unwrap();
        let wrapped = wrap_message(&circuit, UserId(1), b"first message", &mut rand::thread_rng()).unwrap();

        exit.handle_envelope(wrapped.envelope).await.unwrap();
        assert_eq!(exit.log().last_received_decrypted().as_deref(), Some("first message"));

        assert!(exit
            .handle_envelope(Envelope::from_text("bm90IGFuIG9uaW9u"))
            .await
            .is_err());

        let log = exit.log();
        assert_eq!(log.last_received_encrypted().as_deref(), Some("bm90IGFuIG9uaW9u"));
        assert_eq!(log.last_received_decrypted(), None);
        assert_eq!(log.last_destination(), None);
    }

    #[tokio::test]
    async fn test_counts_only_completed_handoffs() {
        let transport = Arc::new(RecordingTransport::default());
        let entry = router(1, transport.clone());
        let exit = router(2, transport.clone());
        let circuit = Circuit::new(vec![entry.identity().relay_node(), exit.identity().relay_node()]).unwrap();
        let wrapped = wrap_message(&circuit, UserId(3), b"hi", &mut rand::thread_rng()).unwrap();

        entry.handle_envelope(wrapped.envelope).await.unwrap();
        let inner = transport.forwarded.lock()[0].1.clone();
        exit.handle_envelope(inner).await.unwrap();

        let first = entry.metrics().snapshot();
        assert_eq!((first.envelopes_forwarded, first.envelopes_delivered), (1, 0));
        let second = exit.metrics().snapshot();
        assert_eq!((second.envelopes_forwarded, second.envelopes_delivered), (0, 1));
        assert_eq!(second.envelopes_failed, 0);
    }
}
