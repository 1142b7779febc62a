// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared test fixtures, grounded on the teacher's `commit_test_fixture.rs`:
//! a single struct that wires up the components a test needs instead of
//! repeating the boilerplate in every test module. Only compiled under
//! `#[cfg(test)]` / the `test-utils` feature.

#![cfg(any(test, feature = "test-utils"))]

use std::sync::Arc;

use consensus_config::NodeId;
use consensus_types::{Round, VertexId};

use crate::dag::{DagStore, InsertOutcome};
use crate::vertex::Vertex;

/// Builds a simple round-by-round DAG: round `r`'s vertices all point at
/// every vertex of round `r - 1` (a "full mesh" DAG), one vertex per
/// authority per round. Useful for exercising certificate/skip predicates
/// without hand-writing parent lists.
pub struct TestDagBuilder {
    store: Arc<DagStore>,
    committee_size: u8,
    last_round: Vec<VertexId>,
    next_round: Round,
}

impl TestDagBuilder {
    pub fn new(committee_size: u8) -> Self {
        Self {
            store: Arc::new(DagStore::new()),
            committee_size,
            last_round: Vec::new(),
            next_round: 0,
        }
    }

    pub fn store(&self) -> Arc<DagStore> {
        self.store.clone()
    }

    /// Adds one full round, every vertex parented on all of `last_round`
    /// (or no parents, for round 0). Returns the ids of this round's
    /// vertices in authority order.
    pub fn add_round(&mut self) -> Vec<VertexId> {
        let parents = self.last_round.clone();
        let round = self.next_round;
        let mut ids = Vec::with_capacity(self.committee_size as usize);
        for author in 0..self.committee_size {
            let vertex = Vertex::new_for_test(NodeId::new_for_test(author), round, parents.clone());
            let id = vertex.id();
            match self.store.insert(vertex) {
                InsertOutcome::Inserted(_) => {}
                InsertOutcome::MissingParent(missing) => {
                    panic!("TestDagBuilder produced an unresolvable parent: {missing:?}")
                }
            }
            ids.push(id);
        }
        self.last_round = ids.clone();
        self.next_round += 1;
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_rounds_with_full_mesh_parentage() {
        let mut builder = TestDagBuilder::new(4);
        let round0 = builder.add_round();
        let round1 = builder.add_round();
        assert_eq!(round0.len(), 4);
        assert_eq!(round1.len(), 4);

        let store = builder.store();
        for id in &round1 {
            let vertex = store.get(*id).unwrap();
            assert_eq!(vertex.parents().len(), 4);
        }
    }
}
