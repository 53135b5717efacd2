// Copyright (c) 2024 Botho Foundation

//! Circuit selection.
//!
//! A [`Circuit`] is an ordered, non-empty path of relays with pairwise
//! distinct node ids. The first hop is the entry relay, which is the only
//! relay the sender talks to directly; the last hop delivers to the
//! destination user.
//!
//! Selection is uniform random without replacement. Senders get their
//! candidates from the node directory, and records whose key text does not
//! import are skipped (nothing could be sealed to them anyway).

use rand::{seq::SliceRandom, Rng};
use shl_crypto_keys::CryptoError;
use shl_directory::DirectoryEntry;
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use super::{NodeId, RelayNode};

/// Errors that can occur while building a circuit or its envelope.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// A circuit needs at least one hop.
    #[error("circuit length must be at least 1")]
    EmptyPath,

    /// Not enough distinct relays to fill the path.
    #[error("insufficient nodes: need {needed}, have {available}")]
    InsufficientNodes {
        /// Hops requested
        needed: usize,
        /// Distinct relays available
        available: usize,
    },

    /// The same relay appears twice in a path.
    #[error("relay {0} appears more than once in the circuit")]
    DuplicateHop(NodeId),

    /// Sealing or encrypting a layer failed.
    #[error("layer encryption failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// An ordered path of distinct relays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Circuit {
    hops: Vec<RelayNode>,
}

impl Circuit {
    /// Build a circuit from an explicit path.
    ///
    /// # Errors
    ///
    /// [`CircuitError::EmptyPath`] for an empty path and
    /// [`CircuitError::DuplicateHop`] if a node id repeats.
    pub fn new(hops: Vec<RelayNode>) -> Result<Self, CircuitError> {
        if hops.is_empty() {
            return Err(CircuitError::EmptyPath);
        }
        let mut seen = HashSet::with_capacity(hops.len());
        for hop in &hops {
            if !seen.insert(hop.node_id) {
                return Err(CircuitError::DuplicateHop(hop.node_id));
            }
        }
        Ok(Self { hops })
    }

    /// Hops in path order, entry first.
    pub fn hops(&self) -> &[RelayNode] {
        &self.hops
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// The entry relay.
    pub fn entry(&self) -> &RelayNode {
        &self.hops[0]
    }

    /// The exit relay, which delivers to the destination.
    pub fn exit(&self) -> &RelayNode {
        &self.hops[self.hops.len() - 1]
    }

    /// Node ids in path order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.hops.iter().map(|hop| hop.node_id).collect()
    }
}

/// Select `path_length` distinct relays uniformly at random.
///
/// Duplicate candidate entries (same node id) count once; the first entry
/// for an id wins.
///
/// # Errors
///
/// - [`CircuitError::EmptyPath`] if `path_length` is zero
/// - [`CircuitError::InsufficientNodes`] if fewer distinct candidates exist
///   than requested. No partial circuit is returned.
pub fn select_circuit<R: Rng + ?Sized>(
    candidates: &[RelayNode],
    path_length: usize,
    rng: &mut R,
) -> Result<Circuit, CircuitError> {
    if path_length == 0 {
        return Err(CircuitError::EmptyPath);
    }

    let mut seen = HashSet::with_capacity(candidates.len());
    let mut distinct: Vec<&RelayNode> = candidates
        .iter()
        .filter(|node| seen.insert(node.node_id))
        .collect();

    if distinct.len() < path_length {
        return Err(CircuitError::InsufficientNodes {
            needed: path_length,
            available: distinct.len(),
        });
    }

    let (chosen, _) = distinct.partial_shuffle(rng, path_length);
    Circuit::new(chosen.iter().map(|node| (*node).clone()).collect())
}

/// Convert directory records into circuit candidates.
///
/// Records whose public key text does not import are logged and skipped.
pub fn import_candidates(entries: &[DirectoryEntry]) -> Vec<RelayNode> {
    entries
        .iter()
        .filter_map(|entry| match RelayNode::from_entry(entry) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!("Skipping relay {} with unusable key: {}", entry.node_id, e);
                None
            }
        })
        .collect()
}
