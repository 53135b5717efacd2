// Copyright (c) 2024 Botho Foundation

//! Key material and primitives for Shallot onion layers.
//!
//! - [`asymmetric`]: relay X25519 keypairs and fixed-size sealed blocks
//!   carrying a short secret to one relay
//! - [`symmetric`]: per-hop ChaCha20-Poly1305 keys for bulk payload
//! - [`KeyText`]: canonical text export/import so keys can travel through
//!   the node directory and inside envelopes
//!
//! # Security
//!
//! Private and symmetric keys zeroize on drop and print only a SHA-256
//! fingerprint in `Debug` output.

#![deny(missing_docs)]

pub mod asymmetric;
mod error;
pub mod symmetric;

pub use asymmetric::{
    open, seal, RelayKeyPair, RelayPrivateKey, RelayPublicKey, SEALED_BLOCK_LEN, SEAL_CAPACITY,
    X25519_KEY_LEN,
};
pub use error::CryptoError;
pub use symmetric::{
    decrypt, encrypt, SymmetricKey, MIN_CIPHERTEXT_LEN, NONCE_SIZE, SYMMETRIC_KEY_LEN, TAG_SIZE,
};

use sha2::{Digest, Sha256};
use shl_util_encodings::{from_base64_array, to_base64};

/// Canonical textual form of a key.
///
/// `import_text(&export_text(k))` yields a key that encrypts and decrypts
/// exactly like `k`.
pub trait KeyText: Sized {
    /// Export the key as base64 text.
    fn export_text(&self) -> String;

    /// Import a key from the text produced by [`KeyText::export_text`].
    ///
    /// # Errors
    ///
    /// [`CryptoError::KeyFormat`] if the text is not base64 or decodes to the
    /// wrong number of bytes.
    fn import_text(text: &str) -> Result<Self, CryptoError>;
}

impl KeyText for RelayPublicKey {
    fn export_text(&self) -> String {
        to_base64(self.as_bytes())
    }

    fn import_text(text: &str) -> Result<Self, CryptoError> {
        decode_key::<X25519_KEY_LEN>(text).map(Self::from_bytes)
    }
}

impl KeyText for RelayPrivateKey {
    fn export_text(&self) -> String {
        to_base64(self.to_bytes().as_slice())
    }

    fn import_text(text: &str) -> Result<Self, CryptoError> {
        let bytes = zeroize::Zeroizing::new(decode_key::<X25519_KEY_LEN>(text)?);
        Ok(Self::from_bytes(*bytes))
    }
}

impl KeyText for SymmetricKey {
    fn export_text(&self) -> String {
        to_base64(self.as_bytes())
    }

    fn import_text(text: &str) -> Result<Self, CryptoError> {
        decode_key::<SYMMETRIC_KEY_LEN>(text).map(Self::from)
    }
}

fn decode_key<const N: usize>(text: &str) -> Result<[u8; N], CryptoError> {
    from_base64_array::<N>(text.trim())
        .map_err(|err| CryptoError::KeyFormat(err.to_string()))?
        .ok_or_else(|| CryptoError::KeyFormat(format!("expected {} key bytes", N)))
}

/// Short SHA-256 fingerprint used in `Debug` output instead of key bytes.
pub(crate) fn fingerprint(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    hex::encode(&hash[..4])
}
