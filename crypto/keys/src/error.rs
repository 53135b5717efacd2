// Copyright (c) 2024 Botho Foundation

//! Errors for relay key handling and layer encryption.

use displaydoc::Display;
use thiserror::Error;

/// Errors that can occur while importing keys or encrypting/decrypting data.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum CryptoError {
    /// Malformed key text: {0}
    KeyFormat(String),

    /// Decryption failed: wrong key or tampered ciphertext
    Decryption,

    /// Ciphertext too short: got {len} bytes, need at least {min}
    Truncated {
        /// Length of the input
        len: usize,
        /// Minimum valid length
        min: usize,
    },

    /// Sealed block has {len} bytes, expected exactly {expected}
    BlockLength {
        /// Length of the input
        len: usize,
        /// The fixed sealed block length
        expected: usize,
    },

    /// Payload of {len} bytes exceeds the sealed block capacity of {max}
    PayloadTooLarge {
        /// Length of the rejected payload
        len: usize,
        /// Maximum payload the block can carry
        max: usize,
    },

    /// Encryption failed
    Encryption,

    /// Key derivation failed
    KeyDerivation,
}
