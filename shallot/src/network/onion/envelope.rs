// Copyright (c) 2024 Botho Foundation

//! Envelope construction and layer peeling.
//!
//! # Layer Format
//!
//! ```text
//! Envelope_k = base64( Seal(pub_k, next_hop_k ‖ hop_key_k)
//!                    ‖ Encrypt(hop_key_k, Envelope_{k+1}) )
//!
//! Envelope_{N+1} = plaintext
//! next_hop_N     = User(destination)
//! next_hop_k     = Relay(node_{k+1})      for k < N
//! ```
//!
//! The sealed block always has [`SEALED_BLOCK_LEN`] bytes, so a relay
//! splits its layer at that offset without a length prefix. Wrapping runs
//! from the innermost layer outward; peeling undoes exactly one layer.

use rand_core::{CryptoRng, RngCore};
use shl_crypto_keys::{
    decrypt, encrypt, open, seal, RelayPrivateKey, RelayPublicKey, SymmetricKey, SEALED_BLOCK_LEN,
    SYMMETRIC_KEY_LEN,
};
use shl_util_encodings::{from_base64, to_base64};
use zeroize::Zeroizing;

use super::{
    Circuit, CircuitError, Envelope, HopAddress, NodeId, PeeledLayer, RelayError, UserId,
    HOP_ADDRESS_LEN,
};

/// Length of the secret sealed to each relay: next-hop address and hop key.
pub const HOP_SECRET_LEN: usize = HOP_ADDRESS_LEN + SYMMETRIC_KEY_LEN;

/// An envelope ready to hand to the entry relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedMessage {
    /// The only relay the sender contacts.
    pub entry: NodeId,
    /// The outermost envelope.
    pub envelope: Envelope,
}

/// Wrap `plaintext` for `destination` in one layer per circuit hop.
///
/// A fresh hop key is generated for every layer.
pub fn wrap_message<R: RngCore + CryptoRng>(
    circuit: &Circuit,
    destination: UserId,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<WrappedMessage, CircuitError> {
    let mut next_hop = HopAddress::User(destination);
    let mut envelope: Option<Envelope> = None;

    for relay in circuit.hops().iter().rev() {
        let inner = envelope
            .as_ref()
            .map_or(plaintext, |envelope| envelope.as_str().as_bytes());
        let layer = seal_layer(&relay.public_key, next_hop, inner, rng)?;

        envelope = Some(Envelope::from(to_base64(layer)));
        next_hop = HopAddress::Relay(relay.node_id);
    }

    let envelope = envelope.ok_or(CircuitError::EmptyPath)?;
    Ok(WrappedMessage {
        entry: circuit.entry().node_id,
        envelope,
    })
}

fn seal_layer<R: RngCore + CryptoRng>(
    public_key: &RelayPublicKey,
    next_hop: HopAddress,
    inner: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>, CircuitError> {
    let hop_key = SymmetricKey::random(rng);

    let mut secret = Zeroizing::new(Vec::with_capacity(HOP_SECRET_LEN));
    secret.extend_from_slice(&next_hop.to_bytes());
    secret.extend_from_slice(hop_key.as_bytes());

    let sealed = seal(public_key, &secret, rng)?;
    let body = encrypt(&hop_key, inner, rng)?;

    let mut layer = Vec::with_capacity(sealed.len() + body.len());
    layer.extend_from_slice(&sealed);
    layer.extend_from_slice(&body);
    Ok(layer)
}

/// Peel one layer with a relay's private key.
///
/// # Errors
///
/// Any failure rejects the whole envelope: undecodable text, a layer
/// shorter than the sealed block, a sealed block that does not open, an
/// unparsable address or key, a body that fails authentication, or (for a
/// relay next hop) an inner envelope that is not text.
pub fn open_layer(private_key: &RelayPrivateKey, envelope: &Envelope) -> Result<PeeledLayer, RelayError> {
    let layer = from_base64(envelope.as_str())?;
    if layer.len() < SEALED_BLOCK_LEN {
        return Err(RelayError::Truncated { len: layer.len() });
    }
    let (sealed, body) = layer.split_at(SEALED_BLOCK_LEN);

    let secret = Zeroizing::new(open(private_key, sealed)?);
    if secret.len() != HOP_SECRET_LEN {
        return Err(RelayError::InvalidHopSecret);
    }
    let (address, key) = secret.split_at(HOP_ADDRESS_LEN);
    let next_hop = HopAddress::from_bytes(address).ok_or(RelayError::InvalidHopSecret)?;
    let hop_key = SymmetricKey::from_bytes(key).ok_or(RelayError::InvalidHopSecret)?;

    let inner = decrypt(&hop_key, body)?;

    match next_hop {
        HopAddress::Relay(next_hop) => {
            let text = String::from_utf8(inner).map_err(|_| RelayError::InvalidInnerEnvelope)?;
            Ok(PeeledLayer::Relay {
                next_hop,
                envelope: Envelope::from(text),
            })
        }
        HopAddress::User(destination) => Ok(PeeledLayer::Final {
            destination,
            plaintext: inner,
        }),
    }
}
