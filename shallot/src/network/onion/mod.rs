// Copyright (c) 2024 Botho Foundation

//! Onion routing core.
//!
//! A sender selects a circuit of relays, then nests one encrypted layer per
//! hop. Each relay peels exactly one layer and learns only its predecessor
//! (the connection it received from) and its successor (the next hop in the
//! layer). The last relay recovers the plaintext and the destination user.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  Envelope_1  ┌─────────┐  Envelope_2  ┌─────────┐  Envelope_3  ┌─────────┐  plaintext  ┌──────┐
//! │  Sender  │─────────────►│ Relay 1 │─────────────►│ Relay 2 │─────────────►│ Relay 3 │────────────►│ User │
//! └──────────┘              └─────────┘              └─────────┘              └─────────┘             └──────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: ids, addresses, relay identities and envelopes
//! - [`circuit`]: random path selection
//! - [`envelope`]: wrapping and peeling layers
//! - [`relay_handler`]: relay-side peeling with counters
//! - [`sink`]: destination inbox

pub mod circuit;
pub mod envelope;
pub mod relay_handler;
pub mod sink;
pub mod types;

pub use circuit::{import_candidates, select_circuit, Circuit, CircuitError};
pub use envelope::{open_layer, wrap_message, WrappedMessage, HOP_SECRET_LEN};
pub use relay_handler::{RelayError, RelayForwarder, RelayMetrics, RelayMetricsSnapshot};
pub use sink::{DeliveryError, DestinationSink, Inbox};
pub use types::{
    Envelope, HopAddress, NodeId, PeeledLayer, RelayIdentity, RelayNode, UserId, HOP_ADDRESS_LEN,
};
