// Copyright (c) 2024 Botho Foundation

//! Destination side of a circuit.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::info;

use super::UserId;

/// Errors raised when final plaintext cannot be handed to its user.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Plaintext is not UTF-8 text.
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    /// No endpoint is known for the user.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// The user's endpoint could not be reached.
    #[error("user {user} unreachable: {reason}")]
    Unreachable {
        /// Destination user
        user: UserId,
        /// Underlying failure
        reason: String,
    },

    /// The user's endpoint refused the message.
    #[error("user {user} refused message with status {status}")]
    Refused {
        /// Destination user
        user: UserId,
        /// HTTP status returned
        status: u16,
    },
}

/// Accepts final plaintext for one user.
pub trait DestinationSink: Send + Sync {
    /// Take delivery of `plaintext`.
    fn deliver(&self, plaintext: &[u8]) -> Result<(), DeliveryError>;
}

/// A user's inbox: keeps the last message received and a delivery count.
#[derive(Debug)]
pub struct Inbox {
    user_id: UserId,
    last_received: RwLock<Option<String>>,
    received: AtomicU64,
}

impl Inbox {
    /// Create an empty inbox for `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            last_received: RwLock::new(None),
            received: AtomicU64::new(0),
        }
    }

    /// Owner of this inbox.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Last message delivered, if any.
    pub fn last_received(&self) -> Option<String> {
        self.last_received.read().clone()
    }

    /// Number of messages delivered.
    pub fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl DestinationSink for Inbox {
    fn deliver(&self, plaintext: &[u8]) -> Result<(), DeliveryError> {
        let text = std::str::from_utf8(plaintext).map_err(|_| DeliveryError::InvalidUtf8)?;
        *self.last_received.write() = Some(text.to_string());
        self.received.fetch_add(1, Ordering::Relaxed);
        info!(user = %self.user_id, bytes = plaintext.len(), "Message delivered");
        Ok(())
    }
}
