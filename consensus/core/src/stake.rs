// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weighted vote accumulation, grounded on the teacher's
//! `StakeAggregator<QuorumThreshold>` usage in `base_committer.rs`: track
//! which authorities have voted and stop as soon as a threshold of total
//! weight is reached.

use std::collections::HashSet;

use consensus_config::{Committee, NodeId, Weight};

/// A threshold expressed against a committee's total weight.
pub trait VoteThreshold {
    fn threshold(committee: &Committee) -> Weight;
}

/// `2f+1` of total weight (§4.3, certificate/quorum threshold). Uses the
/// count-based `cert_threshold` rather than `Committee::quorum_weight`,
/// matching the count-based model the DAG predicates are primarily built
/// against (SPEC_FULL §3) and the worked `n=20` example in §4.3.
pub struct QuorumThreshold;
impl VoteThreshold for QuorumThreshold {
    fn threshold(committee: &Committee) -> Weight {
        committee.cert_threshold() as Weight
    }
}

/// `f+1` of total weight (§4.3, validity threshold).
pub struct ValidityThreshold;
impl VoteThreshold for ValidityThreshold {
    fn threshold(committee: &Committee) -> Weight {
        committee.byzantine_budget() as Weight + 1
    }
}

/// Accumulates distinct-authority weight until a threshold is crossed.
/// Adding the same authority twice is a no-op, matching the teacher's
/// aggregator (a Byzantine authority cannot buy a second vote).
pub struct StakeAggregator<T> {
    voted: HashSet<NodeId>,
    accumulated: Weight,
    _threshold: std::marker::PhantomData<T>,
}

impl<T: VoteThreshold> StakeAggregator<T> {
    pub fn new() -> Self {
        Self {
            voted: HashSet::new(),
            accumulated: 0,
            _threshold: std::marker::PhantomData,
        }
    }

    /// Records `authority`'s vote. Returns `true` if the threshold is met
    /// after this call (i.e. this call, or a prior one, crossed it).
    pub fn add(&mut self, authority: NodeId, committee: &Committee) -> bool {
        if self.voted.insert(authority) {
            self.accumulated += committee.weight(authority);
        }
        self.accumulated >= T::threshold(committee)
    }

    pub fn stake(&self) -> Weight {
        self.accumulated
    }

    pub fn voters(&self) -> &HashSet<NodeId> {
        &self.voted
    }

    pub fn reached_threshold(&self, committee: &Committee) -> bool {
        self.accumulated >= T::threshold(committee)
    }
}

impl<T: VoteThreshold> Default for StakeAggregator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_config::CommitteeBuilder;

    fn committee(n: u8) -> Committee {
        let mut b = CommitteeBuilder::new(0);
        for i in 0..n {
            b.add_authority(
                NodeId::new_for_test(i),
                1,
                consensus_config::ClassicalPublicKey([i; 48]),
                consensus_config::PqPublicKey(vec![i]),
                consensus_config::NetworkPublicKey([i; 32]),
                format!("n{i}"),
            );
        }
        b.build()
    }

    #[test]
    fn quorum_needs_2f_plus_1() {
        let c = committee(20);
        assert_eq!(c.cert_threshold(), 13);
        let mut agg = StakeAggregator::<QuorumThreshold>::new();
        for i in 0..12 {
            assert!(!agg.add(NodeId::new_for_test(i), &c));
        }
        assert!(agg.add(NodeId::new_for_test(12), &c));
    }

    #[test]
    fn duplicate_vote_does_not_double_count() {
        let c = committee(20);
        let mut agg = StakeAggregator::<QuorumThreshold>::new();
        agg.add(NodeId::new_for_test(0), &c);
        agg.add(NodeId::new_for_test(0), &c);
        assert_eq!(agg.stake(), 1);
    }
}
