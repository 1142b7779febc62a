// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Key material for the two signature schemes a validator carries.
//!
//! Actual signing/verification/aggregation is an external collaborator per
//! the core's scope: this module only fixes the byte shapes and the
//! `classical_pk`/`pq_pk` newtypes the rest of the crate refers to. Swap the
//! inner byte layout here if the concrete BLS-style or lattice-based scheme
//! changes; nothing else in the workspace should assume a particular scheme.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classical (BLS-style, aggregatable) public key of a validator.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassicalPublicKey(pub [u8; 48]);

/// Classical signature share or aggregate. Aggregates and per-author shares
/// share a wire shape at this layer; the aggregator (an external
/// collaborator) is responsible for telling them apart.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicalSignature(pub [u8; 96]);

/// Post-quantum (lattice-based, "Ringtail"/"Quasar") threshold public key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PqPublicKey(pub Vec<u8>);

/// A single validator's post-quantum threshold signature share.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PqShare(pub Vec<u8>);

/// An aggregated post-quantum threshold certificate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PqCertificate(pub Vec<u8>);

/// Network key is used for transport identity of the authority. Network
/// transport itself is out of this core's scope; only the identity shape
/// is fixed here so `NetworkInfo` has something stable to carry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkPublicKey(pub [u8; 32]);

impl fmt::Debug for ClassicalPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_prefix(&self.0))
    }
}

impl fmt::Debug for PqPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_prefix(&self.0))
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    let n = bytes.len().min(4);
    bytes[..n].iter().map(|b| format!("{b:02x}")).collect()
}
