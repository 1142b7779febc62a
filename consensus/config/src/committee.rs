// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ClassicalPublicKey, NetworkPublicKey, PqPublicKey};

/// Committee/epoch counter.
pub type Epoch = u64;

/// Opaque 32-byte node identifier with a total order, per the data model.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_test(index: u8) -> Self {
        let mut bytes = [0u8; 32];
        bytes[0] = index;
        Self(bytes)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}{:02x}..", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// Voting weight of an authority. The core treats `n` (validator count) and
/// `f = (n-1)/3` as the primary quorum model (§4.3's numeric semantics);
/// `weight` is carried for callers that want a stake-weighted quorum
/// instead (see SPEC_FULL §3) but is not required by the count-based
/// predicates in `consensus_core::dag::predicates`.
pub type Weight = u64;

/// Per-authority identity and key material, as of a given `Committee`
/// snapshot (component A: "Validator Set").
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorityInfo {
    pub node_id: NodeId,
    pub weight: Weight,
    pub classical_pk: ClassicalPublicKey,
    pub pq_pk: PqPublicKey,
    pub network_key: NetworkPublicKey,
    pub hostname: String,
}

/// A read-only snapshot of `{NodeId -> (weight, classical_pk, pq_pk)}` at a
/// given height/epoch. Immutable once built; a new epoch swaps the `Arc`
/// pointer wholesale rather than mutating an existing `Committee` (§5,
/// "shared-resource policy").
#[derive(Clone, Serialize, Deserialize)]
pub struct Committee {
    epoch: Epoch,
    authorities: Vec<AuthorityInfo>,
    total_weight: Weight,
}

impl Committee {
    fn new(epoch: Epoch, authorities: Vec<AuthorityInfo>) -> Self {
        assert!(!authorities.is_empty(), "committee cannot be empty");
        let total_weight = authorities.iter().map(|a| a.weight).sum();
        assert_ne!(total_weight, 0, "total weight cannot be zero");
        Self {
            epoch,
            authorities,
            total_weight,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Number of validators `n`.
    pub fn size(&self) -> usize {
        self.authorities.len()
    }

    /// Byzantine fault budget `f = (n-1)/3` (integer division), per §4.3.
    pub fn byzantine_budget(&self) -> usize {
        (self.size().saturating_sub(1)) / 3
    }

    /// `2f+1`, the certificate/commit quorum.
    pub fn cert_threshold(&self) -> usize {
        2 * self.byzantine_budget() + 1
    }

    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    pub fn quorum_weight(&self) -> Weight {
        2 * self.total_weight / 3 + 1
    }

    pub fn authorities(&self) -> impl Iterator<Item = (usize, &AuthorityInfo)> {
        self.authorities.iter().enumerate()
    }

    pub fn authority(&self, index: usize) -> &AuthorityInfo {
        &self.authorities[index]
    }

    pub fn weight(&self, node_id: NodeId) -> Weight {
        self.authorities
            .iter()
            .find(|a| a.node_id == node_id)
            .map(|a| a.weight)
            .unwrap_or(0)
    }

    pub fn index_of(&self, node_id: NodeId) -> Option<usize> {
        self.authorities.iter().position(|a| a.node_id == node_id)
    }

    pub fn authority_by_id(&self, node_id: NodeId) -> Option<&AuthorityInfo> {
        self.authorities.iter().find(|a| a.node_id == node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.index_of(node_id).is_some()
    }
}

/// Builds a `Committee`. Mirrors the teacher's `CommitteeBuilder`: epoch is
/// fixed at construction, authorities are appended one at a time.
pub struct CommitteeBuilder {
    epoch: Epoch,
    authorities: Vec<AuthorityInfo>,
}

impl CommitteeBuilder {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            authorities: Vec::new(),
        }
    }

    pub fn add_authority(
        &mut self,
        node_id: NodeId,
        weight: Weight,
        classical_pk: ClassicalPublicKey,
        pq_pk: PqPublicKey,
        network_key: NetworkPublicKey,
        hostname: String,
    ) -> &mut Self {
        self.authorities.push(AuthorityInfo {
            node_id,
            weight,
            classical_pk,
            pq_pk,
            network_key,
            hostname,
        });
        self
    }

    pub fn build(self) -> Committee {
        Committee::new(self.epoch, self.authorities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_committee(n: u8) -> Committee {
        let mut builder = CommitteeBuilder::new(0);
        for i in 0..n {
            builder.add_authority(
                NodeId::new_for_test(i),
                1,
                ClassicalPublicKey([i; 48]),
                PqPublicKey(vec![i; 16]),
                NetworkPublicKey([i; 32]),
                format!("node-{i}"),
            );
        }
        builder.build()
    }

    #[test]
    fn numeric_semantics_n20() {
        let committee = test_committee(20);
        assert_eq!(committee.size(), 20);
        assert_eq!(committee.byzantine_budget(), 6);
        assert_eq!(committee.cert_threshold(), 13);
    }

    #[test]
    fn weight_lookup() {
        let committee = test_committee(4);
        let id = committee.authority(2).node_id;
        assert_eq!(committee.weight(id), 1);
        assert_eq!(committee.index_of(id), Some(2));
        assert!(!committee.contains(NodeId::new_for_test(99)));
    }
}
