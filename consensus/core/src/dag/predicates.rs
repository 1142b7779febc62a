// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! DAG Predicates (component E, §4.3): pure, side-effect-free functions
//! over a `DagStore`. `has_certificate`/`has_skip` are grounded on the
//! teacher's `base_committer.rs` `is_vote`/`is_certificate` machinery
//! (walk ancestors, accumulate stake via `StakeAggregator<QuorumThreshold>`,
//! short-circuit once threshold is reached); the order-theoretic
//! primitives (`is_reachable`, `LCA`, `antichain`, `transitive_closure`,
//! `choose_frontier`, `compute_safe_prefix`) have no direct teacher
//! counterpart and are built from scratch over `DagStore`'s child/parent
//! edges.

use std::collections::{HashSet, VecDeque};

use consensus_config::{Committee, NodeId};
use consensus_types::{Round, VertexId};

use crate::dag::store::DagStore;
use crate::stake::{QuorumThreshold, StakeAggregator};

/// Commit-or-skip classification of a proposer vertex (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Commit,
    Skip,
    Undecided,
}

/// True iff there is a directed path `from -> ... -> to` following child
/// edges. Terminates even in the presence of a cycle (forbidden by the DAG
/// invariant, but the search still tracks visited nodes defensively).
pub fn is_reachable(store: &DagStore, from: VertexId, to: VertexId) -> bool {
    if from == to {
        return true;
    }
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([from]);
    visited.insert(from);
    while let Some(current) = queue.pop_front() {
        for child in store.children(current) {
            if child == to {
                return true;
            }
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
    false
}

/// All ancestors of `v` (following parent edges), including `v` itself.
pub fn transitive_closure(store: &DagStore, v: VertexId) -> HashSet<VertexId> {
    let mut closure = HashSet::new();
    let mut queue = VecDeque::from([v]);
    closure.insert(v);
    while let Some(current) = queue.pop_front() {
        let Some(vertex) = store.get(current) else {
            continue;
        };
        for parent in vertex.parents() {
            if closure.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }
    closure
}

/// The closest (highest-round) common ancestor of `a` and `b`. Ties are
/// broken by the lower round, then by the lexicographically smaller id
/// (both tie-breaks are vacuous here since a single highest-round ancestor
/// is unique in a valid DAG, but the ordering is applied for determinism
/// when it is not).
pub fn lca(store: &DagStore, a: VertexId, b: VertexId) -> Option<VertexId> {
    let ancestors_a = transitive_closure(store, a);
    let ancestors_b = transitive_closure(store, b);

    let mut candidates: Vec<VertexId> = ancestors_a.intersection(&ancestors_b).copied().collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by_key(|id| {
        let round = store.get(*id).map(|v| v.round()).unwrap_or(0);
        (std::cmp::Reverse(round), *id)
    });
    candidates.into_iter().next()
}

/// The subset of `vertices` such that no element reaches another (per the
/// `is_reachable` child-edge ordering).
pub fn antichain(store: &DagStore, vertices: &[VertexId]) -> Vec<VertexId> {
    let mut result = Vec::new();
    for (i, &candidate) in vertices.iter().enumerate() {
        let dominated = vertices.iter().enumerate().any(|(j, &other)| {
            i != j && is_reachable(store, candidate, other)
        });
        if !dominated {
            result.push(candidate);
        }
    }
    result
}

/// Byzantine-tolerant deterministic parent selection (§4.3). `candidates`
/// is assumed already in a caller-chosen deterministic order (e.g. sorted
/// by id); this function only decides how many to keep.
pub fn choose_frontier(candidates: &[VertexId]) -> Vec<VertexId> {
    let n = candidates.len();
    if n <= 3 {
        return candidates.to_vec();
    }
    let f = (n - 1) / 3;
    let required = 2 * f + 1;
    candidates[..required].to_vec()
}

/// `>= cert_threshold` vertices in round `proposer_round + 1` support the
/// proposer vertex, i.e. have it as an ancestor per `DagStore::supports`
/// (§3 Data Model).
pub fn has_certificate(
    store: &DagStore,
    committee: &Committee,
    proposer: VertexId,
    proposer_round: Round,
) -> bool {
    let Some(proposer_author) = store.get(proposer).map(|v| v.author()) else {
        return false;
    };
    let mut votes = StakeAggregator::<QuorumThreshold>::new();
    for candidate in store.by_round(proposer_round + 1) {
        if store.supports(candidate, proposer_author, proposer_round) {
            if let Some(vertex) = store.get(candidate) {
                if votes.add(vertex.author(), committee) {
                    return true;
                }
            }
        }
    }
    false
}

/// `>= cert_threshold` vertices in round `proposer_round + 1` do NOT
/// support the proposer vertex.
pub fn has_skip(
    store: &DagStore,
    committee: &Committee,
    proposer: VertexId,
    proposer_round: Round,
) -> bool {
    let Some(proposer_author) = store.get(proposer).map(|v| v.author()) else {
        return false;
    };
    let mut blames = StakeAggregator::<QuorumThreshold>::new();
    for candidate in store.by_round(proposer_round + 1) {
        if !store.supports(candidate, proposer_author, proposer_round) {
            if let Some(vertex) = store.get(candidate) {
                if blames.add(vertex.author(), committee) {
                    return true;
                }
            }
        }
    }
    false
}

/// The commit/skip/undecided disjunction over a proposer vertex. Safety:
/// `has_certificate` and `has_skip` cannot both hold (§4.3); a release
/// build that observes otherwise aborts rather than silently picking one
/// (§7 kind 4, matching the teacher's `base_committer.rs` fatal `panic!`s).
pub fn classify(
    store: &DagStore,
    committee: &Committee,
    proposer: VertexId,
    proposer_round: Round,
) -> Classification {
    let certified = has_certificate(store, committee, proposer, proposer_round);
    let skipped = has_skip(store, committee, proposer, proposer_round);
    if certified && skipped {
        panic!(
            "fatal: vertex {proposer:?} at round {proposer_round} has both a certificate and a \
             skip quorum simultaneously (§7 kind 4)"
        );
    }
    match (certified, skipped) {
        (true, _) => Classification::Commit,
        (_, true) => Classification::Skip,
        _ => Classification::Undecided,
    }
}

/// Vertices that are ancestors of every vertex in `frontier` — the
/// finality-safe commit set.
pub fn compute_safe_prefix(store: &DagStore, frontier: &[VertexId]) -> HashSet<VertexId> {
    let mut iter = frontier.iter();
    let Some(&first) = iter.next() else {
        return HashSet::new();
    };
    let mut safe = transitive_closure(store, first);
    for &v in iter {
        let closure = transitive_closure(store, v);
        safe.retain(|id| closure.contains(id));
    }
    safe
}
