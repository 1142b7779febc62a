// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics shared by all components of this authority, mirroring
//! the teacher's `context.rs`'s `metrics: Arc<Metrics>` and
//! `authority_node.rs`'s `initialise_metrics(registry)`. Exporting these to
//! an HTTP endpoint is out of scope; registering and updating them is not.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};

pub struct Metrics {
    /// Poll rounds issued by the sampling engine (component C).
    pub poll_rounds_total: IntCounter,
    /// Poll rounds that returned an empty tally (fewer than `k` peers reachable).
    pub poll_rounds_empty_total: IntCounter,
    /// Preference flips recorded by confidence counters (component B).
    pub confidence_flips_total: IntCounter,
    /// Confidence records that reached `finalized = true`.
    pub confidence_finalized_total: IntCounter,
    /// Vertices whose DAG classification (component E) resolved to `Commit`.
    pub dag_commits_total: IntCounter,
    /// Vertices whose DAG classification resolved to `Skip`.
    pub dag_skips_total: IntCounter,
    /// Dual certificates (classical + PQ) successfully assembled.
    pub certificates_assembled_total: IntCounter,
    /// Quasar (PQ) timeouts observed by the vote aggregator.
    pub quasar_timeouts_total: IntCounter,
    /// Slashing evidence records emitted, labeled by kind.
    pub slashing_evidence_total: IntCounterVec,
    /// Current number of entries held by the witness admission cache.
    pub witness_cache_entries: IntGauge,
    /// Current number of bytes held by the witness admission cache.
    pub witness_cache_bytes: IntGauge,
    /// Height of the most recently advanced event horizon.
    pub event_horizon_height: IntGauge,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            poll_rounds_total: register_int_counter_with_registry!(
                "consensus_poll_rounds_total",
                "Total number of sampling-engine poll rounds issued",
                registry,
            )
            .unwrap(),
            poll_rounds_empty_total: register_int_counter_with_registry!(
                "consensus_poll_rounds_empty_total",
                "Poll rounds that returned an empty tally",
                registry,
            )
            .unwrap(),
            confidence_flips_total: register_int_counter_with_registry!(
                "consensus_confidence_flips_total",
                "Preference flips recorded by confidence counters",
                registry,
            )
            .unwrap(),
            confidence_finalized_total: register_int_counter_with_registry!(
                "consensus_confidence_finalized_total",
                "Confidence records that reached finality",
                registry,
            )
            .unwrap(),
            dag_commits_total: register_int_counter_with_registry!(
                "consensus_dag_commits_total",
                "Vertices classified Commit by the DAG predicates",
                registry,
            )
            .unwrap(),
            dag_skips_total: register_int_counter_with_registry!(
                "consensus_dag_skips_total",
                "Vertices classified Skip by the DAG predicates",
                registry,
            )
            .unwrap(),
            certificates_assembled_total: register_int_counter_with_registry!(
                "consensus_certificates_assembled_total",
                "Dual (classical + PQ) certificates assembled",
                registry,
            )
            .unwrap(),
            quasar_timeouts_total: register_int_counter_with_registry!(
                "consensus_quasar_timeouts_total",
                "PQ aggregation deadlines elapsed before threshold",
                registry,
            )
            .unwrap(),
            slashing_evidence_total: register_int_counter_vec_with_registry!(
                "consensus_slashing_evidence_total",
                "Slashing evidence records emitted, by kind",
                &["kind"],
                registry,
            )
            .unwrap(),
            witness_cache_entries: register_int_gauge_with_registry!(
                "consensus_witness_cache_entries",
                "Entries currently held by the witness admission cache",
                registry,
            )
            .unwrap(),
            witness_cache_bytes: register_int_gauge_with_registry!(
                "consensus_witness_cache_bytes",
                "Bytes currently held by the witness admission cache",
                registry,
            )
            .unwrap(),
            event_horizon_height: register_int_gauge_with_registry!(
                "consensus_event_horizon_height",
                "Height of the most recently advanced event horizon",
                registry,
            )
            .unwrap(),
        }
    }

    #[cfg(test)]
    pub fn new_for_test() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new(&Registry::new()))
    }
}
