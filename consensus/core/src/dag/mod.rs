// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! DAG ordering layer: the vertex store (component D) and the pure
//! predicates evaluated over it (component E).

pub mod predicates;
pub mod store;

pub use predicates::{
    antichain, choose_frontier, classify, compute_safe_prefix, has_certificate, has_skip,
    is_reachable, lca, transitive_closure, Classification,
};
pub use store::{DagStore, InsertOutcome};
