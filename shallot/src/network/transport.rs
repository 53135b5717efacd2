// Copyright (c) 2024 Botho Foundation

//! Moving envelopes between hops.
//!
//! The onion core performs exactly one outbound call per envelope, through
//! [`HopTransport`]: `forward` to the next relay or `deliver` to the
//! destination user. Two implementations ship here:
//!
//! - [`HttpTransport`]: POSTs `{"message": text}` to the hop's `/message`
//!   endpoint, locating hops through an [`AddressResolver`]
//! - [`LocalNetwork`]: dispatches directly to in-process routers and
//!   inboxes
//!
//! Address derivation is pluggable. [`PortLayout`] derives ports from ids
//! (relays at `base_relay_port + id`, users at `base_user_port + id`);
//! [`StaticAddresses`] maps ids to explicit URLs.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::debug;

use crate::config::{
    NetworkConfig, DEFAULT_BASE_RELAY_PORT, DEFAULT_BASE_USER_PORT, DEFAULT_HOST,
    DEFAULT_REGISTRY_PORT,
};
use crate::network::onion::{
    DeliveryError, DestinationSink, Envelope, HopAddress, Inbox, NodeId, UserId,
};
use crate::node::OnionRouter;

/// Errors raised when an envelope cannot be handed to the next relay.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No address is known for the relay.
    #[error("no address known for relay {0}")]
    UnknownRelay(NodeId),

    /// The request could not be completed.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Target URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The next hop answered with a non-success status.
    #[error("{url} responded with status {status}")]
    Status {
        /// Target URL
        url: String,
        /// HTTP status returned
        status: u16,
    },

    /// An in-process relay failed to handle the envelope.
    #[error("relay {relay} failed: {reason}")]
    Downstream {
        /// The relay that failed
        relay: NodeId,
        /// Its error
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Outbound calls a relay or sender makes.
#[async_trait]
pub trait HopTransport: Send + Sync {
    /// Hand `envelope` to relay `to`.
    async fn forward(&self, to: NodeId, envelope: &Envelope) -> Result<(), TransportError>;

    /// Hand final `plaintext` to user `to`.
    async fn deliver(&self, to: UserId, plaintext: &[u8]) -> Result<(), DeliveryError>;
}

/// Maps node and user ids to base URLs.
pub trait AddressResolver: Send + Sync {
    /// Base URL of the node directory.
    fn registry_url(&self) -> String;

    /// Base URL of a relay.
    fn relay_url(&self, node: NodeId) -> Option<String>;

    /// Base URL of a user.
    fn user_url(&self, user: UserId) -> Option<String>;

    /// Base URL of whichever hop `hop` names.
    fn hop_url(&self, hop: HopAddress) -> Option<String> {
        match hop {
            HopAddress::Relay(node) => self.relay_url(node),
            HopAddress::User(user) => self.user_url(user),
        }
    }
}

/// Derives every address from a host and base ports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortLayout {
    /// Host all services bind on.
    pub host: String,
    /// Port of the node directory.
    pub registry_port: u16,
    /// Relay `n` listens on `base_relay_port + n`.
    pub base_relay_port: u16,
    /// User `n` listens on `base_user_port + n`.
    pub base_user_port: u16,
}

impl Default for PortLayout {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            registry_port: DEFAULT_REGISTRY_PORT,
            base_relay_port: DEFAULT_BASE_RELAY_PORT,
            base_user_port: DEFAULT_BASE_USER_PORT,
        }
    }
}

impl From<&NetworkConfig> for PortLayout {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            host: config.host.clone(),
            registry_port: config.registry_port,
            base_relay_port: config.base_relay_port,
            base_user_port: config.base_user_port,
        }
    }
}

impl PortLayout {
    /// Port of relay `node`, if it fits in a `u16`.
    pub fn relay_port(&self, node: NodeId) -> Option<u16> {
        offset_port(self.base_relay_port, node.0)
    }

    /// Port of user `user`, if it fits in a `u16`.
    pub fn user_port(&self, user: UserId) -> Option<u16> {
        offset_port(self.base_user_port, user.0)
    }

    fn url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }
}

fn offset_port(base: u16, id: u32) -> Option<u16> {
    u32::from(base)
        .checked_add(id)
        .and_then(|port| u16::try_from(port).ok())
}

impl AddressResolver for PortLayout {
    fn registry_url(&self) -> String {
        self.url(self.registry_port)
    }

    fn relay_url(&self, node: NodeId) -> Option<String> {
        self.relay_port(node).map(|port| self.url(port))
    }

    fn user_url(&self, user: UserId) -> Option<String> {
        self.user_port(user).map(|port| self.url(port))
    }
}

/// Explicit id-to-URL mapping.
#[derive(Clone, Debug, Default)]
pub struct StaticAddresses {
    registry: String,
    relays: HashMap<NodeId, String>,
    users: HashMap<UserId, String>,
}

impl StaticAddresses {
    /// Start a mapping with the directory's URL.
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            registry: registry_url.into(),
            ..Default::default()
        }
    }

    /// Add a relay.
    pub fn with_relay(mut self, node: NodeId, url: impl Into<String>) -> Self {
        self.relays.insert(node, url.into());
        self
    }

    /// Add a user.
    pub fn with_user(mut self, user: UserId, url: impl Into<String>) -> Self {
        self.users.insert(user, url.into());
        self
    }
}

impl AddressResolver for StaticAddresses {
    fn registry_url(&self) -> String {
        self.registry.clone()
    }

    fn relay_url(&self, node: NodeId) -> Option<String> {
        self.relays.get(&node).cloned()
    }

    fn user_url(&self, user: UserId) -> Option<String> {
        self.users.get(&user).cloned()
    }
}

/// Join a base URL and a path.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// HTTP transport: POSTs `{"message": ...}` to `{hop}/message`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    resolver: Arc<dyn AddressResolver>,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout.
    pub fn new(resolver: Arc<dyn AddressResolver>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client, resolver })
    }

    async fn post_message(&self, base: &str, message: &str) -> Result<(), TransportError> {
        let url = endpoint(base, "/message");
        debug!("POST {} ({} bytes)", url, message.len());

        let response = self
            .client
            .post(&url)
            .json(&json!({ "message": message }))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HopTransport for HttpTransport {
    async fn forward(&self, to: NodeId, envelope: &Envelope) -> Result<(), TransportError> {
        let base = self
            .resolver
            .relay_url(to)
            .ok_or(TransportError::UnknownRelay(to))?;
        self.post_message(&base, envelope.as_str()).await
    }

    async fn deliver(&self, to: UserId, plaintext: &[u8]) -> Result<(), DeliveryError> {
        let base = self.resolver.user_url(to).ok_or(DeliveryError::UnknownUser(to))?;
        let message = std::str::from_utf8(plaintext).map_err(|_| DeliveryError::InvalidUtf8)?;

        self.post_message(&base, message)
            .await
            .map_err(|e| match e {
                TransportError::Status { status, .. } => DeliveryError::Refused { user: to, status },
                other => DeliveryError::Unreachable {
                    user: to,
                    reason: other.to_string(),
                },
            })
    }
}

/// In-process network of routers and inboxes.
///
/// Routers registered here should use the same `LocalNetwork` as their
/// transport so that forwarding stays in-process end to end.
#[derive(Default)]
pub struct LocalNetwork {
    routers: RwLock<HashMap<NodeId, Arc<OnionRouter>>>,
    inboxes: RwLock<HashMap<UserId, Arc<Inbox>>>,
}

impl LocalNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a router under its node id.
    pub fn add_router(&self, router: Arc<OnionRouter>) {
        self.routers.write().insert(router.node_id(), router);
    }

    /// Attach an inbox under its user id.
    pub fn add_inbox(&self, inbox: Arc<Inbox>) {
        self.inboxes.write().insert(inbox.user_id(), inbox);
    }

    /// Look up a router.
    pub fn router(&self, node: NodeId) -> Option<Arc<OnionRouter>> {
        self.routers.read().get(&node).cloned()
    }

    /// Look up an inbox.
    pub fn inbox(&self, user: UserId) -> Option<Arc<Inbox>> {
        self.inboxes.read().get(&user).cloned()
    }
}

#[async_trait]
impl HopTransport for LocalNetwork {
    async fn forward(&self, to: NodeId, envelope: &Envelope) -> Result<(), TransportError> {
        let router = self.router(to).ok_or(TransportError::UnknownRelay(to))?;
        router
            .handle_envelope(envelope.clone())
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Downstream {
                relay: to,
                reason: e.to_string(),
            })
    }

    async fn deliver(&self, to: UserId, plaintext: &[u8]) -> Result<(), DeliveryError> {
        let inbox = self.inbox(to).ok_or(DeliveryError::UnknownUser(to))?;
        inbox.deliver(plaintext)
    }
}
