// Copyright (c) 2024 Botho Foundation

//! Relay keypairs and fixed-size sealed blocks.
//!
//! A relay publishes an X25519 public key. Senders seal a short secret (the
//! next-hop address and the hop's symmetric key) to that public key:
//!
//! ```text
//! ephemeral X25519 keypair (fresh per block)
//!     │ DH(ephemeral, relay public)
//!     ▼
//! HKDF-SHA256(salt = ephemeral_pub ‖ relay_pub, info = domain)
//!     │
//!     ├── 32-byte ChaCha20-Poly1305 key
//!     └── 12-byte nonce
//!
//! block = [ephemeral_pub (32)][Enc(len (1) ‖ payload ‖ zero padding)][tag (16)]
//! ```
//!
//! The payload is padded to [`SEAL_CAPACITY`], so every block is exactly
//! [`SEALED_BLOCK_LEN`] bytes regardless of what it carries. Relays rely on
//! this to split a layer into its sealed and bulk portions.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{
    symmetric::{NONCE_SIZE, SYMMETRIC_KEY_LEN, TAG_SIZE},
    CryptoError,
};

/// Length of an X25519 public or private key in bytes.
pub const X25519_KEY_LEN: usize = 32;

/// Maximum payload a sealed block can carry.
pub const SEAL_CAPACITY: usize = 64;

/// Exact length of every sealed block.
pub const SEALED_BLOCK_LEN: usize = X25519_KEY_LEN + 1 + SEAL_CAPACITY + TAG_SIZE;

/// Domain separation string for sealed block key derivation.
const SEAL_DOMAIN: &[u8] = b"shallot-seal-v1";

/// A relay's long-term public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayPublicKey(PublicKey);

impl RelayPublicKey {
    /// Create a public key from raw bytes.
    pub fn from_bytes(bytes: [u8; X25519_KEY_LEN]) -> Self {
        Self(PublicKey::from(bytes))
    }

    /// Get the raw bytes of this key.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; X25519_KEY_LEN] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for RelayPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayPublicKey({})", hex::encode(&self.as_bytes()[..4]))
    }
}

/// A relay's long-term private key.
///
/// The wrapped secret zeroizes itself on drop. This key never leaves the
/// relay process except through an explicit [`crate::KeyText`] export.
#[derive(Clone)]
pub struct RelayPrivateKey(StaticSecret);

impl RelayPrivateKey {
    /// Create a private key from raw bytes.
    pub fn from_bytes(bytes: [u8; X25519_KEY_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Get the raw bytes of this key. Never log the result.
    pub fn to_bytes(&self) -> Zeroizing<[u8; X25519_KEY_LEN]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> RelayPublicKey {
        RelayPublicKey(PublicKey::from(&self.0))
    }
}

impl fmt::Debug for RelayPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RelayPrivateKey(public sha256:{})",
            crate::fingerprint(self.public_key().as_bytes())
        )
    }
}

/// A relay's long-term keypair.
#[derive(Clone, Debug)]
pub struct RelayKeyPair {
    public: RelayPublicKey,
    private: RelayPrivateKey,
}

impl RelayKeyPair {
    /// Generate a fresh keypair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        Self::from_private(RelayPrivateKey(secret))
    }

    /// Rebuild a keypair from its private half.
    pub fn from_private(private: RelayPrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    /// The public half, safe to publish.
    pub fn public_key(&self) -> &RelayPublicKey {
        &self.public
    }

    /// The private half.
    pub fn private_key(&self) -> &RelayPrivateKey {
        &self.private
    }
}

/// Seal `payload` so only the holder of `recipient`'s private key can read
/// it.
///
/// # Errors
///
/// - [`CryptoError::PayloadTooLarge`] if `payload` exceeds
///   [`SEAL_CAPACITY`]; nothing is produced and nothing is truncated.
/// - [`CryptoError::KeyFormat`] if `recipient` is a low-order point.
pub fn seal<R: RngCore + CryptoRng>(
    recipient: &RelayPublicKey,
    payload: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>, CryptoError> {
    if payload.len() > SEAL_CAPACITY {
        return Err(CryptoError::PayloadTooLarge {
            len: payload.len(),
            max: SEAL_CAPACITY,
        });
    }

    let ephemeral = EphemeralSecret::random_from_rng(rng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient.0);
    if !shared.was_contributory() {
        return Err(CryptoError::KeyFormat(
            "public key is a low-order point".to_string(),
        ));
    }

    let (key, nonce) = derive_seal_keys(shared.as_bytes(), &ephemeral_public, &recipient.0)?;

    let mut padded = Zeroizing::new(vec![0u8; 1 + SEAL_CAPACITY]);
    padded[0] = payload.len() as u8;
    padded[1..1 + payload.len()].copy_from_slice(payload);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce.as_slice()), padded.as_slice())
        .map_err(|_| CryptoError::Encryption)?;

    let mut block = Vec::with_capacity(SEALED_BLOCK_LEN);
    block.extend_from_slice(ephemeral_public.as_bytes());
    block.extend_from_slice(&ciphertext);
    debug_assert_eq!(block.len(), SEALED_BLOCK_LEN);
    Ok(block)
}

/// Open a block produced by [`seal`].
///
/// # Errors
///
/// - [`CryptoError::BlockLength`] if `block` is not exactly
///   [`SEALED_BLOCK_LEN`] bytes.
/// - [`CryptoError::Decryption`] if the block was sealed to another key or
///   any byte was modified.
pub fn open(recipient: &RelayPrivateKey, block: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if block.len() != SEALED_BLOCK_LEN {
        return Err(CryptoError::BlockLength {
            len: block.len(),
            expected: SEALED_BLOCK_LEN,
        });
    }

    let (ephemeral_bytes, ciphertext) = block.split_at(X25519_KEY_LEN);
    let ephemeral_bytes: [u8; X25519_KEY_LEN] = ephemeral_bytes
        .try_into()
        .map_err(|_| CryptoError::Decryption)?;
    let ephemeral_public = PublicKey::from(ephemeral_bytes);

    let shared = recipient.0.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(CryptoError::Decryption);
    }

    let recipient_public = PublicKey::from(&recipient.0);
    let (key, nonce) = derive_seal_keys(shared.as_bytes(), &ephemeral_public, &recipient_public)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
    let padded = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(nonce.as_slice()), ciphertext)
            .map_err(|_| CryptoError::Decryption)?,
    );

    let len = padded[0] as usize;
    if len > SEAL_CAPACITY {
        return Err(CryptoError::Decryption);
    }
    Ok(padded[1..1 + len].to_vec())
}

/// Derive the block key and nonce from a DH shared secret.
///
/// Both public keys go into the salt so a block cannot be replayed under a
/// different recipient or ephemeral key.
fn derive_seal_keys(
    shared_secret: &[u8; 32],
    ephemeral_public: &PublicKey,
    recipient_public: &PublicKey,
) -> Result<
    (
        Zeroizing<[u8; SYMMETRIC_KEY_LEN]>,
        Zeroizing<[u8; NONCE_SIZE]>,
    ),
    CryptoError,
> {
    let mut salt = [0u8; 2 * X25519_KEY_LEN];
    salt[..X25519_KEY_LEN].copy_from_slice(ephemeral_public.as_bytes());
    salt[X25519_KEY_LEN..].copy_from_slice(recipient_public.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret);

    let mut okm = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN + NONCE_SIZE]);
    hkdf.expand(SEAL_DOMAIN, okm.as_mut_slice())
        .map_err(|_| CryptoError::KeyDerivation)?;

    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    let mut nonce = Zeroizing::new([0u8; NONCE_SIZE]);
    key.copy_from_slice(&okm[..SYMMETRIC_KEY_LEN]);
    nonce.copy_from_slice(&okm[SYMMETRIC_KEY_LEN..]);
    Ok((key, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> RelayKeyPair {
        RelayKeyPair::generate(&mut rand::thread_rng())
    }

    #[test]
    fn test_seal_open_round_trip() {
        let pair = keypair();
        let mut rng = rand::thread_rng();

        let block = seal(pair.public_key(), b"next hop + key", &mut rng).unwrap();
        assert_eq!(block.len(), SEALED_BLOCK_LEN);
        assert_eq!(open(pair.private_key(), &block).unwrap(), b"next hop + key");
    }

    #[test]
    fn test_block_size_is_fixed() {
        let pair = keypair();
        let mut rng = rand::thread_rng();

        for len in [0, 1, 37, SEAL_CAPACITY] {
            let payload = vec![0xA5; len];
            let block = seal(pair.public_key(), &payload, &mut rng).unwrap();
            assert_eq!(block.len(), SEALED_BLOCK_LEN);
            assert_eq!(open(pair.private_key(), &block).unwrap(), payload);
        }
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let pair = keypair();
        let result = seal(
            pair.public_key(),
            &[0u8; SEAL_CAPACITY + 1],
            &mut rand::thread_rng(),
        );
        assert_eq!(
            result,
            Err(CryptoError::PayloadTooLarge {
                len: SEAL_CAPACITY + 1,
                max: SEAL_CAPACITY
            })
        );
    }

    #[test]
    fn test_mismatched_private_key_fails() {
        let sender_view = keypair();
        let other = keypair();

        let block = seal(sender_view.public_key(), b"secret", &mut rand::thread_rng()).unwrap();
        assert_eq!(open(other.private_key(), &block), Err(CryptoError::Decryption));
    }

    #[test]
    fn test_every_flipped_byte_detected() {
        let pair = keypair();
        let block = seal(pair.public_key(), b"address+key", &mut rand::thread_rng()).unwrap();

        for i in 0..block.len() {
            let mut tampered = block.clone();
            tampered[i] ^= 0x80;
            assert!(
                open(pair.private_key(), &tampered).is_err(),
                "flip at byte {} went unnoticed",
                i
            );
        }
    }

    #[test]
    fn test_wrong_length_block_rejected() {
        let pair = keypair();
        let result = open(pair.private_key(), &[0u8; SEALED_BLOCK_LEN - 1]);
        assert!(matches!(result, Err(CryptoError::BlockLength { .. })));
    }

    #[test]
    fn test_low_order_recipient_rejected() {
        let zero = RelayPublicKey::from_bytes([0u8; X25519_KEY_LEN]);
        let result = seal(&zero, b"x", &mut rand::thread_rng());
        assert!(matches!(result, Err(CryptoError::KeyFormat(_))));
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = keypair();
        let b = keypair();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_keypair_from_private_matches() {
        let pair = keypair();
        let rebuilt = RelayKeyPair::from_private(pair.private_key().clone());
        assert_eq!(rebuilt.public_key(), pair.public_key());
    }

    #[test]
    fn test_private_debug_does_not_leak() {
        let pair = RelayKeyPair::from_private(RelayPrivateKey::from_bytes([0x42; 32]));
        let debug = format!("{:?}", pair.private_key());
        assert!(!debug.contains("4242"));
        assert!(debug.contains("sha256:"));
    }
}
