// Copyright (c) 2024 Botho Foundation

//! Symmetric hop keys and authenticated bulk encryption.
//!
//! Every onion layer's payload is protected with ChaCha20-Poly1305 under a
//! fresh 256-bit key. Ciphertext layout:
//!
//! ```text
//! [nonce (12 bytes)][ciphertext][tag (16 bytes)]
//! ```
//!
//! The nonce is random per call, so encrypting the same payload twice under
//! the same key yields different ciphertexts.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

/// Length of symmetric keys in bytes (256-bit for ChaCha20-Poly1305).
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// Size of ChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of ChaCha20-Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Smallest valid output of [`encrypt`] (empty plaintext).
pub const MIN_CIPHERTEXT_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// A symmetric key for encrypting one hop's payload.
///
/// The key is zeroed from memory when dropped. `Clone` is intentionally not
/// derived; use [`SymmetricKey::duplicate`] when a second copy is needed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    /// Generate a new random symmetric key.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; SYMMETRIC_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create a symmetric key from raw bytes.
    ///
    /// Returns `None` if the slice length is not exactly
    /// [`SYMMETRIC_KEY_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; SYMMETRIC_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Get the raw bytes of this key.
    ///
    /// Avoid copying or logging the returned reference.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }

    /// Create an explicit copy of this key. Both copies are zeroed on drop.
    pub fn duplicate(&self) -> Self {
        Self(self.0)
    }
}

impl From<[u8; SYMMETRIC_KEY_LEN]> for SymmetricKey {
    fn from(bytes: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the key itself
        write!(f, "SymmetricKey(sha256:{})", crate::fingerprint(&self.0))
    }
}

/// Encrypt `plaintext` under `key`.
///
/// Returns `[nonce][ciphertext][tag]`.
pub fn encrypt<R: RngCore + CryptoRng>(
    key: &SymmetricKey,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt the output of [`encrypt`].
///
/// Fails with [`CryptoError::Decryption`] on a wrong key or any modified
/// byte, and with [`CryptoError::Truncated`] if the input cannot even hold a
/// nonce and a tag.
pub fn decrypt(key: &SymmetricKey, encrypted: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if encrypted.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::Truncated {
            len: encrypted.len(),
            min: MIN_CIPHERTEXT_LEN,
        });
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let (nonce, ciphertext) = encrypted.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> SymmetricKey {
        SymmetricKey::random(&mut rand::thread_rng())
    }

    #[test]
    fn test_round_trip() {
        let key = random_key();
        let encrypted = encrypt(&key, b"bulk payload", &mut rand::thread_rng()).unwrap();
        assert_eq!(encrypted.len(), MIN_CIPHERTEXT_LEN + 12);
        assert_eq!(decrypt(&key, &encrypted).unwrap(), b"bulk payload");
    }

    #[test]
    fn test_empty_payload() {
        let key = random_key();
        let encrypted = encrypt(&key, b"", &mut rand::thread_rng()).unwrap();
        assert_eq!(encrypted.len(), MIN_CIPHERTEXT_LEN);
        assert!(decrypt(&key, &encrypted).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt(&random_key(), b"secret", &mut rand::thread_rng()).unwrap();
        assert_eq!(
            decrypt(&random_key(), &encrypted),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn test_every_flipped_byte_detected() {
        let key = random_key();
        let encrypted = encrypt(&key, b"tamper me", &mut rand::thread_rng()).unwrap();

        for i in 0..encrypted.len() {
            let mut tampered = encrypted.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                decrypt(&key, &tampered),
                Err(CryptoError::Decryption),
                "flip at byte {} went unnoticed",
                i
            );
        }
    }

    #[test]
    fn test_truncated_input() {
        let key = random_key();
        let result = decrypt(&key, &[0u8; MIN_CIPHERTEXT_LEN - 1]);
        assert!(matches!(result, Err(CryptoError::Truncated { .. })));
    }

    #[test]
    fn test_nonce_uniqueness() {
        let key = random_key();
        let mut rng = rand::thread_rng();
        let first = encrypt(&key, b"same payload", &mut rng).unwrap();
        let second = encrypt(&key, b"same payload", &mut rng).unwrap();
        assert_ne!(&first[..NONCE_SIZE], &second[..NONCE_SIZE]);
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert!(SymmetricKey::from_bytes(&[0x42u8; 16]).is_none());
        assert!(SymmetricKey::from_bytes(&[0x42u8; SYMMETRIC_KEY_LEN]).is_some());
    }

    #[test]
    fn test_debug_does_not_leak() {
        let key = SymmetricKey([0x42u8; SYMMETRIC_KEY_LEN]);
        let debug = format!("{:?}", key);
        assert!(!debug.contains("4242"));
        assert!(debug.contains("sha256:"));
    }

    #[test]
    fn test_duplicate_is_usable() {
        let key = random_key();
        let copy = key.duplicate();
        let encrypted = encrypt(&key, b"shared", &mut rand::thread_rng()).unwrap();
        assert_eq!(decrypt(&copy, &encrypted).unwrap(), b"shared");
    }
}
