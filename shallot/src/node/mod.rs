// Copyright (c) 2024 Botho Foundation

//! Node roles: onion routers and users.

pub mod relay;
pub mod user;

pub use relay::{HopLog, OnionRouter, RelayOutcome};
pub use user::{SendError, UserNode};
