// Copyright (c) 2024 Botho Foundation

//! Core types for onion routing.
//!
//! - [`UserId`]: identifier of a destination user (distinct from relay ids)
//! - [`HopAddress`]: the next hop a relay learns when it peels its layer
//! - [`RelayNode`]: a relay's public identity as seen by senders
//! - [`RelayIdentity`]: a relay's full identity, including its private key
//! - [`Envelope`]: the textual artifact passed between hops
//! - [`PeeledLayer`]: what a relay recovers from one envelope
//!
//! # Security
//!
//! `RelayIdentity` never serializes its private key, and its `Debug` output
//! shows only the public half.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use shl_crypto_keys::{CryptoError, KeyText, RelayKeyPair, RelayPrivateKey, RelayPublicKey};
use shl_directory::{DirectoryEntry, RegisterNodeBody};
use std::fmt;

pub use shl_directory::NodeId;

/// Length of an encoded [`HopAddress`] in bytes.
pub const HOP_ADDRESS_LEN: usize = 5;

const HOP_TAG_RELAY: u8 = 0x01;
const HOP_TAG_USER: u8 = 0x02;

/// Identifier of a destination user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for UserId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Address of the hop that follows a relay.
///
/// Encoded as one tag byte followed by the big-endian id:
///
/// ```text
/// [0x01][node_id: u32 BE]   next hop is a relay
/// [0x02][user_id: u32 BE]   next hop is the destination user
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HopAddress {
    /// Forward to another relay.
    Relay(NodeId),
    /// Deliver to the destination user.
    User(UserId),
}

impl HopAddress {
    /// Encode to the 5-byte wire form.
    pub fn to_bytes(self) -> [u8; HOP_ADDRESS_LEN] {
        let (tag, id) = match self {
            HopAddress::Relay(node) => (HOP_TAG_RELAY, node.0),
            HopAddress::User(user) => (HOP_TAG_USER, user.0),
        };
        let mut bytes = [0u8; HOP_ADDRESS_LEN];
        bytes[0] = tag;
        bytes[1..].copy_from_slice(&id.to_be_bytes());
        bytes
    }

    /// Decode the 5-byte wire form. Unknown tags and wrong lengths yield
    /// `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&tag, id) = bytes.split_first()?;
        let id = u32::from_be_bytes(<[u8; 4]>::try_from(id).ok()?);
        match tag {
            HOP_TAG_RELAY => Some(HopAddress::Relay(NodeId(id))),
            HOP_TAG_USER => Some(HopAddress::User(UserId(id))),
            _ => None,
        }
    }
}

impl fmt::Display for HopAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HopAddress::Relay(node) => write!(f, "relay {}", node),
            HopAddress::User(user) => write!(f, "user {}", user),
        }
    }
}

/// A relay as seen by senders: its id and public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayNode {
    /// Directory id of the relay.
    pub node_id: NodeId,
    /// Public key used to seal this relay's layer.
    pub public_key: RelayPublicKey,
}

impl RelayNode {
    /// Import a relay from its directory record.
    ///
    /// # Errors
    ///
    /// [`CryptoError::KeyFormat`] if the record's key text does not decode.
    pub fn from_entry(entry: &DirectoryEntry) -> Result<Self, CryptoError> {
        Ok(Self {
            node_id: entry.node_id,
            public_key: RelayPublicKey::import_text(&entry.pub_key)?,
        })
    }

    /// The directory record describing this relay.
    pub fn to_entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            node_id: self.node_id,
            pub_key: self.public_key.export_text(),
        }
    }
}

/// A relay's own identity, held privately by the relay process.
#[derive(Clone)]
pub struct RelayIdentity {
    node_id: NodeId,
    keys: RelayKeyPair,
}

impl RelayIdentity {
    /// Generate a fresh keypair for `node_id`.
    pub fn generate<R: RngCore + CryptoRng>(node_id: NodeId, rng: &mut R) -> Self {
        Self {
            node_id,
            keys: RelayKeyPair::generate(rng),
        }
    }

    /// The relay's directory id.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The relay's public key.
    pub fn public_key(&self) -> &RelayPublicKey {
        self.keys.public_key()
    }

    /// The relay's private key.
    pub fn private_key(&self) -> &RelayPrivateKey {
        self.keys.private_key()
    }

    /// Public view of this relay.
    pub fn relay_node(&self) -> RelayNode {
        RelayNode {
            node_id: self.node_id,
            public_key: *self.keys.public_key(),
        }
    }

    /// Registration request announcing this relay to the directory.
    pub fn registration(&self) -> RegisterNodeBody {
        RegisterNodeBody::new(self.node_id, self.keys.public_key().export_text())
    }
}

impl fmt::Debug for RelayIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayIdentity")
            .field("node_id", &self.node_id)
            .field("public_key", self.keys.public_key())
            .finish_non_exhaustive()
    }
}

/// Textual onion envelope.
///
/// Each layer is `base64(sealed_block ‖ symmetric_ciphertext)`. The sealed
/// block is [`shl_crypto_keys::SEALED_BLOCK_LEN`] bytes; the remainder
/// decrypts to the next envelope's text, or to the plaintext at the last
/// hop.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(String);

impl Envelope {
    /// Wrap envelope text received from the wire.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The envelope text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the envelope text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Length of the envelope text in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the envelope text is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Envelope {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Result of peeling one layer.
#[derive(Debug, PartialEq, Eq)]
pub enum PeeledLayer {
    /// Pass `envelope` to relay `next_hop` unchanged.
    Relay {
        /// The relay that receives the inner envelope.
        next_hop: NodeId,
        /// The inner envelope.
        envelope: Envelope,
    },
    /// Last hop: deliver `plaintext` to `destination`.
    Final {
        /// The destination user.
        destination: UserId,
        /// The recovered message.
        plaintext: Vec<u8>,
    },
}
