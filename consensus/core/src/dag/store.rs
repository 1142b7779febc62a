// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! DAG Store (component D, §4.3). Holds every admitted vertex, indexed by
//! round and by parent/child edges, and suspends vertices whose parents
//! have not arrived yet. Suspension tracking is grounded on the teacher's
//! `block_manager.rs` (`suspended_blocks` / `missing_ancestors` maps); the
//! concurrent index itself mirrors `dag_state.rs`'s `DashMap`-backed store
//! elsewhere in the teacher workspace.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use consensus_config::NodeId;
use consensus_types::{Height, Round, VertexId};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::vertex::Vertex;

struct Suspended {
    vertex: Arc<Vertex>,
    missing: HashSet<VertexId>,
}

/// Outcome of `DagStore::insert`.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The vertex (and any vertex it unblocked) is now admitted, in
    /// admission order.
    Inserted(Vec<VertexId>),
    /// Still missing at least one parent; the vertex is held pending.
    MissingParent(VertexId),
}

pub struct DagStore {
    vertices: DashMap<VertexId, Arc<Vertex>>,
    children: DashMap<VertexId, HashSet<VertexId>>,
    by_round: DashMap<Round, HashSet<VertexId>>,
    /// Tips: admitted vertices with no admitted child yet.
    tips: Mutex<HashSet<VertexId>>,
    suspended: Mutex<HashMap<VertexId, Suspended>>,
    /// missing parent id -> set of suspended vertex ids waiting on it.
    waiting_on: Mutex<HashMap<VertexId, HashSet<VertexId>>>,
}

impl DagStore {
    pub fn new() -> Self {
        Self {
            vertices: DashMap::new(),
            children: DashMap::new(),
            by_round: DashMap::new(),
            tips: Mutex::new(HashSet::new()),
            suspended: Mutex::new(HashMap::new()),
            waiting_on: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: VertexId) -> Option<Arc<Vertex>> {
        self.vertices.get(&id).map(|v| v.clone())
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn children(&self, id: VertexId) -> Vec<VertexId> {
        self.children
            .get(&id)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn by_round(&self, round: Round) -> Vec<VertexId> {
        self.by_round
            .get(&round)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn head(&self) -> Vec<VertexId> {
        self.tips.lock().iter().copied().collect()
    }

    /// Attempts to admit `vertex`. If any parent is missing, the vertex is
    /// suspended and `MissingParent` is returned naming one such parent;
    /// the caller (the DAG ordering driver) is expected to fetch it and
    /// retry. Admitting a vertex may transitively unsuspend children that
    /// were only waiting on it.
    pub fn insert(&self, vertex: Vertex) -> InsertOutcome {
        let id = vertex.id();
        if self.vertices.contains_key(&id) {
            return InsertOutcome::Inserted(vec![]);
        }

        let missing: HashSet<VertexId> = vertex
            .parents()
            .iter()
            .copied()
            .filter(|p| !self.vertices.contains_key(p))
            .collect();

        if let Some(&first_missing) = missing.iter().next() {
            let vertex = Arc::new(vertex);
            {
                let mut waiting_on = self.waiting_on.lock();
                for parent in &missing {
                    waiting_on.entry(*parent).or_default().insert(id);
                }
            }
            self.suspended.lock().insert(id, Suspended { vertex, missing });
            return InsertOutcome::MissingParent(first_missing);
        }

        let mut admitted = vec![self.admit(vertex)];
        admitted.extend(self.unsuspend_ready_children(id));
        InsertOutcome::Inserted(admitted)
    }

    fn admit(&self, vertex: Vertex) -> VertexId {
        let id = vertex.id();
        let round = vertex.round();
        let parents: Vec<VertexId> = vertex.parents().to_vec();

        let expected_height = Vertex::expected_height(&self.parent_heights(&parents));
        if vertex.height() != expected_height {
            panic!(
                "height inconsistency: vertex {id:?} has height {} but parents {parents:?} \
                 imply {expected_height} (fatal, §7 kind 4)",
                vertex.height(),
            );
        }

        self.vertices.insert(id, Arc::new(vertex));
        self.by_round.entry(round).or_default().insert(id);
        self.children.entry(id).or_default();

        let mut tips = self.tips.lock();
        for parent in &parents {
            self.children.entry(*parent).or_default().insert(id);
            tips.remove(parent);
        }
        tips.insert(id);
        id
    }

    fn unsuspend_ready_children(&self, newly_admitted: VertexId) -> Vec<VertexId> {
        let waiters = {
            let mut waiting_on = self.waiting_on.lock();
            waiting_on.remove(&newly_admitted).unwrap_or_default()
        };

        let mut admitted = Vec::new();
        for waiter in waiters {
            let ready = {
                let mut suspended = self.suspended.lock();
                if let Some(entry) = suspended.get_mut(&waiter) {
                    entry.missing.remove(&newly_admitted);
                    entry.missing.is_empty()
                } else {
                    false
                }
            };
            if ready {
                let vertex = {
                    let mut suspended = self.suspended.lock();
                    suspended.remove(&waiter).map(|s| s.vertex)
                };
                if let Some(vertex) = vertex {
                    let vertex = Arc::try_unwrap(vertex).unwrap_or_else(|arc| (*arc).clone());
                    let id = self.admit(vertex);
                    admitted.push(id);
                    admitted.extend(self.unsuspend_ready_children(id));
                }
            }
        }
        admitted
    }

    /// Height of each of `parents`; panics if any parent is unknown, as
    /// callers must only ask about admitted vertices.
    pub fn parent_heights(&self, parents: &[VertexId]) -> Vec<Height> {
        parents
            .iter()
            .map(|p| self.get(*p).expect("caller checked parent admitted").height())
            .collect()
    }

    /// True iff `from` has an ancestor (following parent edges, inclusive
    /// of `from` itself) authored by `author` at `round` (§3 Data Model,
    /// component D's `supports` operation). Ancestor rounds only decrease
    /// walking backwards, so the search stops once every frontier vertex's
    /// round has already fallen to or below `round`.
    pub fn supports(&self, from: VertexId, author: NodeId, round: Round) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from]);
        visited.insert(from);
        while let Some(current) = queue.pop_front() {
            let Some(vertex) = self.get(current) else {
                continue;
            };
            if vertex.author() == author && vertex.round() == round {
                return true;
            }
            if vertex.round() <= round {
                continue;
            }
            for parent in vertex.parents() {
                if visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
        false
    }
}

impl Default for DagStore {
    fn default() -> Self {
        Self::new()
    }
}
