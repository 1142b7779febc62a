// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core of the metastable/DAG/dual-certificate consensus engine (§2).
//!
//! Module-to-component mapping, leaves first:
//! - [`stake`] / [`confidence`] — weighted vote accumulation (B's helper)
//!   and the per-choice confidence state machine (component B).
//! - [`sampling`] — the poll-round driver (component C).
//! - [`dag`] — the vertex store and the pure order-theoretic predicates
//!   over it (components D and E).
//! - [`witness`] — the bounded witness admission cache (component F).
//! - [`signing`] / [`aggregator`] — the classical/PQ signature contracts
//!   and the dual-certificate assembly pipeline (component G).
//! - [`payload`] — the opaque application-payload validation boundary
//!   admission checks against before a vertex enters the DAG.
//! - [`finalization`] — the top-level per-vertex state machine wiring B,
//!   C, E and G together (component H).
//! - [`slashing`] — evidence emission for quasar timeouts and invalid PQ
//!   shares (component I).
//! - [`epoch`] — event-horizon checkpoint advancement (component J).
//! - [`vertex`] — the layer-2 DAG unit and its lifecycle status.
//! - [`context`] / [`metrics`] / [`constants`] / [`error`] — ambient
//!   per-authority state, Prometheus metrics, tuning constants and the
//!   boundary error taxonomy re-exported from `consensus-types`.
//! - [`signals`] — the single stop signal every cancellable wait observes.
//! - [`node`] — assembles every component into a running authority.

pub mod aggregator;
pub mod confidence;
pub mod constants;
pub mod context;
pub mod dag;
pub mod epoch;
pub mod error;
pub mod finalization;
pub mod metrics;
pub mod node;
pub mod payload;
pub mod sampling;
pub mod signals;
pub mod signing;
pub mod slashing;
pub mod stake;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
pub mod vertex;
pub mod witness;
