// Copyright (c) 2024 Botho Foundation

//! Text encodings for binary data that must cross a text-only transport.
//!
//! Every ciphertext and key that leaves a process travels as a JSON string,
//! so all of them go through the single canonical encoding defined here:
//! standard base64 with padding. `from_base64(&to_base64(b)) == b` for every
//! byte string, including the empty one.

#![deny(missing_docs)]

use base64::{engine::general_purpose::STANDARD, Engine};
use displaydoc::Display;
use thiserror::Error;

/// Errors produced when decoding text back into bytes.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum EncodingError {
    /// Invalid base64 input: {0}
    InvalidBase64(String),
}

/// Encode bytes as standard, padded base64.
pub fn to_base64(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard, padded base64 text back into bytes.
pub fn from_base64(text: &str) -> Result<Vec<u8>, EncodingError> {
    STANDARD
        .decode(text)
        .map_err(|err| EncodingError::InvalidBase64(err.to_string()))
}

/// Decode base64 text into a fixed-size array.
///
/// Returns `None` when the decoded length is not exactly `N`.
pub fn from_base64_array<const N: usize>(text: &str) -> Result<Option<[u8; N]>, EncodingError> {
    let bytes = from_base64(text)?;
    Ok(<[u8; N]>::try_from(bytes.as_slice()).ok())
}
