// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::OnceLock;

use consensus_config::NodeId;
use consensus_types::{Height, Round, TxId, VertexId};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::aggregator::CertificateBundle;

/// The layer-2 unit of the DAG (§3, "Vertex / Block"). `id` is a
/// deterministic function of every field except `certs` (certificates do
/// not change identity), computed lazily and cached the way the teacher's
/// `BlockV1::digest` caches its `OnceCell<BlockDigest>`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Vertex {
    header: VertexHeader,
    #[serde(skip)]
    id: OnceLock<VertexId>,
    /// Populated by the Vote Aggregator (component G) once both
    /// certificates have assembled. `None` until then.
    certs: Option<CertificateBundle>,
}

/// The hashed portion of a vertex: everything the id is derived from.
#[derive(Clone, Serialize, Deserialize)]
pub struct VertexHeader {
    pub parents: Vec<VertexId>,
    pub height: Height,
    pub round: Round,
    pub author: NodeId,
    pub timestamp: i64,
    pub payload: Vec<u8>,
    pub epoch_bit: bool,
    pub fpc_votes: Vec<TxId>,
}

/// Ternary choice status (§3). Terminal statuses are `Accepted`/`Rejected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Processing,
    Accepted,
    Rejected,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Accepted | Status::Rejected)
    }
}

impl Vertex {
    pub fn new(header: VertexHeader) -> Self {
        Self {
            header,
            id: OnceLock::new(),
            certs: None,
        }
    }

    pub fn id(&self) -> VertexId {
        *self.id.get_or_init(|| {
            let bytes = bcs::to_bytes(&self.header).expect("vertex header serializes");
            let digest = Sha256::digest(bytes);
            VertexId::from_bytes(digest.into())
        })
    }

    pub fn header(&self) -> &VertexHeader {
        &self.header
    }

    pub fn parents(&self) -> &[VertexId] {
        &self.header.parents
    }

    pub fn height(&self) -> Height {
        self.header.height
    }

    pub fn round(&self) -> Round {
        self.header.round
    }

    pub fn author(&self) -> NodeId {
        self.header.author
    }

    pub fn epoch_bit(&self) -> bool {
        self.header.epoch_bit
    }

    pub fn fpc_votes(&self) -> &[TxId] {
        &self.header.fpc_votes
    }

    pub fn certs(&self) -> Option<&CertificateBundle> {
        self.certs.as_ref()
    }

    /// Attaches the dual certificate bundle. Does not change `id` (certs
    /// are excluded from the header hash by construction).
    pub fn attach_certs(&mut self, certs: CertificateBundle) {
        self.certs = Some(certs);
    }

    /// One greater than the max parent height, computed from a caller-supplied
    /// parent height slice (the DAG store enforces this equals `self.height()`
    /// at admission time). A parentless vertex (the DAG's genesis) has
    /// height 0 by convention; every other vertex has at least one parent
    /// per the Data Model.
    pub fn expected_height(parent_heights: &[Height]) -> Height {
        match parent_heights.iter().copied().max() {
            Some(max_parent) => 1 + max_parent,
            None => 0,
        }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_test(
        author: NodeId,
        round: Round,
        parents: Vec<VertexId>,
    ) -> Self {
        let height = round;
        Self::new(VertexHeader {
            parents,
            height,
            round,
            author,
            timestamp: 0,
            payload: Vec::new(),
            epoch_bit: false,
            fpc_votes: Vec::new(),
        })
    }
}

impl std::fmt::Debug for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Vertex(id={:?}, round={}, author={:?})",
            self.id(),
            self.round(),
            self.author()
        )
    }
}
