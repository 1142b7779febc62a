// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Peer-to-peer wire message *shapes* (§6). Transport/gossip/RPC framing is
//! an external collaborator; this module only fixes what goes inside the
//! envelope so the core's components can be exercised without a network.

use consensus_config::{ClassicalSignature, Epoch, NodeId, PqShare as PqShareBytes};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ids::{BlockId, Height, Round, VertexId};

/// Every message carries this envelope (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub chain_id: Epoch,
    pub request_id: u64,
    pub deadline: Duration,
    pub payload: T,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VertexHeader {
    pub id: VertexId,
    pub parents: Vec<VertexId>,
    pub height: Height,
    pub round: Round,
    pub author: NodeId,
    pub timestamp: i64,
    pub epoch_bit: bool,
    pub fpc_votes: Vec<crate::ids::TxId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    pub header: VertexHeader,
    pub payload: Vec<u8>,
    pub classical_signature: ClassicalSignature,
}

/// Gossip topic identifier for PQ shares: `"RTSH|height"`.
pub fn pq_share_topic(height: Height) -> String {
    format!("RTSH|{height}")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PqShare {
    pub height: Height,
    pub author: NodeId,
    pub share_bytes: PqShareBytes,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub round_id: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub round_id: u64,
    pub preference: VertexId,
}

/// Optimized multi-preference response ("Chits").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chits {
    pub round_id: u64,
    pub preferences: Vec<VertexId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetBlock {
    pub id: BlockId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PutBlock {
    pub id: BlockId,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetAncestors {
    pub id: BlockId,
    pub max_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiPut {
    pub blocks: Vec<PutBlock>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetAccepted {
    pub container_ids: Vec<BlockId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Accepted {
    pub container_ids: Vec<BlockId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetAcceptedFrontier;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptedFrontier {
    pub container_ids: Vec<BlockId>,
}

/// Every request type above has a `_Failed` counterpart that carries just
/// the envelope's `request_id` plus a reason string, signalling the
/// request could not be serviced (peer unreachable, deadline elapsed, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Failed {
    pub request_id: u64,
    pub reason: String,
}
