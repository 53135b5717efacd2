// Copyright (c) 2024 Botho Foundation

//! Networking for Shallot: the onion core, hop transports and the
//! directory client.

pub mod directory_client;
pub mod onion;
pub mod transport;

pub use directory_client::DirectoryClient;
pub use transport::{
    AddressResolver, HopTransport, HttpTransport, LocalNetwork, PortLayout, StaticAddresses,
    TransportError,
};
