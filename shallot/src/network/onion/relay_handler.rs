// Copyright (c) 2024 Botho Foundation

//! Relay-side layer peeling.
//!
//! # Message Flow
//!
//! ```text
//! Receive Envelope
//!     │
//!     ▼
//! Decode text, split at SEALED_BLOCK_LEN
//!     │
//!     ├── Bad encoding / short layer → Rejected
//!     │
//!     ▼
//! Open sealed block with relay private key → (next hop, hop key)
//!     │
//!     ├── Open fails / bad address or key → Rejected
//!     │
//!     ▼
//! Decrypt remainder with hop key
//!     │
//!     ├── Authentication fails → Rejected
//!     │
//!     ▼
//! Resolve next hop
//!     │
//!     ├── Relay(next) → PeeledLayer::Relay (inner envelope forwarded unchanged)
//!     │
//!     └── User(dest)  → PeeledLayer::Final (plaintext for the destination)
//! ```
//!
//! # Security Considerations
//!
//! - Never log decrypted payload contents or key material
//! - A rejected envelope is never forwarded

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

use shl_crypto_keys::CryptoError;
use shl_util_encodings::EncodingError;

use super::{open_layer, DeliveryError, Envelope, NodeId, PeeledLayer, RelayIdentity};
use crate::network::transport::TransportError;

/// Errors that can occur while handling an envelope at a relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Envelope text is not valid base64.
    #[error("invalid envelope encoding: {0}")]
    InvalidEncoding(#[from] EncodingError),

    /// Decoded layer is shorter than a sealed block.
    #[error("truncated layer: {len} bytes")]
    Truncated {
        /// Decoded layer length
        len: usize,
    },

    /// Sealed block or body failed to decrypt.
    #[error("layer decryption failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Sealed secret does not hold a valid next hop and hop key.
    #[error("invalid hop secret")]
    InvalidHopSecret,

    /// Inner envelope for the next relay is not text.
    #[error("inner envelope is not valid text")]
    InvalidInnerEnvelope,

    /// Forwarding to the next relay failed.
    #[error("forwarding failed: {0}")]
    Forward(#[from] TransportError),

    /// Delivering to the destination failed.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl RelayError {
    /// Whether the envelope itself was rejected, as opposed to a failure
    /// further down the circuit.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, RelayError::Forward(_) | RelayError::Delivery(_))
    }
}

/// Counters for relay traffic.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Envelopes received.
    pub envelopes_received: AtomicU64,
    /// Inner envelopes accepted by the next relay.
    pub envelopes_forwarded: AtomicU64,
    /// Plaintexts accepted by the destination user.
    pub envelopes_delivered: AtomicU64,
    /// Envelopes rejected.
    pub envelopes_rejected: AtomicU64,
    /// Peeled envelopes whose forward or delivery failed.
    pub envelopes_failed: AtomicU64,
}

impl RelayMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self) {
        Self::inc(&self.envelopes_forwarded);
    }

    pub(crate) fn record_delivered(&self) {
        Self::inc(&self.envelopes_delivered);
    }

    pub(crate) fn record_failed(&self) {
        Self::inc(&self.envelopes_failed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            envelopes_received: self.envelopes_received.load(Ordering::Relaxed),
            envelopes_forwarded: self.envelopes_forwarded.load(Ordering::Relaxed),
            envelopes_delivered: self.envelopes_delivered.load(Ordering::Relaxed),
            envelopes_rejected: self.envelopes_rejected.load(Ordering::Relaxed),
            envelopes_failed: self.envelopes_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of relay metrics for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMetricsSnapshot {
    /// Envelopes received.
    pub envelopes_received: u64,
    /// Inner envelopes accepted by the next relay.
    pub envelopes_forwarded: u64,
    /// Plaintexts accepted by the destination user.
    pub envelopes_delivered: u64,
    /// Envelopes rejected.
    pub envelopes_rejected: u64,
    /// Peeled envelopes whose forward or delivery failed.
    pub envelopes_failed: u64,
}

/// Peels envelopes addressed to one relay.
///
/// Stateless per envelope: the only state is the relay's identity, which is
/// fixed after start-up, and the counters.
#[derive(Debug)]
pub struct RelayForwarder {
    identity: RelayIdentity,
    metrics: RelayMetrics,
}

impl RelayForwarder {
    /// Create a forwarder for `identity`.
    pub fn new(identity: RelayIdentity) -> Self {
        Self {
            identity,
            metrics: RelayMetrics::new(),
        }
    }

    /// The relay's node id.
    pub fn node_id(&self) -> NodeId {
        self.identity.node_id()
    }

    /// The relay's identity.
    pub fn identity(&self) -> &RelayIdentity {
        &self.identity
    }

    /// Get the relay metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Peel exactly one layer.
    pub fn peel(&self, envelope: &Envelope) -> Result<PeeledLayer, RelayError> {
        RelayMetrics::inc(&self.metrics.envelopes_received);

        match open_layer(self.identity.private_key(), envelope) {
            Ok(layer) => {
                match &layer {
                    PeeledLayer::Relay { next_hop, .. } => {
                        debug!(relay = %self.node_id(), next_hop = %next_hop, "Peeled relay layer");
                    }
                    PeeledLayer::Final { destination, .. } => {
                        debug!(relay = %self.node_id(), destination = %destination, "Peeled final layer");
                    }
                }
                Ok(layer)
            }
            Err(e) => {
                RelayMetrics::inc(&self.metrics.envelopes_rejected);
                warn!("Relay {} rejected envelope: {}", self.node_id(), e);
                Err(e)
            }
        }
    }
}
