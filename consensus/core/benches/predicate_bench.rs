// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for the two hottest per-round paths in the core: folding a
//! poll tally into a confidence counter (component B) and classifying a
//! proposer vertex against the DAG (component E). Adapted in spirit from
//! the teacher's `commit_finalizer_bench.rs`, scaled down to the
//! confidence/DAG-predicate primitives this crate actually has.

use std::collections::HashMap;

use consensus_config::{NodeId, Parameters};
use consensus_core::confidence::ConfidenceCounter;
use consensus_core::context::Context;
use consensus_core::dag::{classify, DagStore, InsertOutcome};
use consensus_core::vertex::Vertex;
use consensus_types::VertexId;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

fn fold_unanimous_tally(c: &mut Criterion) {
    let params = Parameters::mainnet();
    let subject = VertexId::from_bytes([7u8; 32]);
    let mut tally = HashMap::new();
    tally.insert(subject, params.k);

    let mut group = c.benchmark_group("ConfidenceCounter");
    group
        .throughput(Throughput::Elements(1))
        .bench_function("fold_unanimous_tally", |b| {
            b.iter_batched(
                ConfidenceCounter::new,
                |mut counter| {
                    for _ in 0..params.beta {
                        counter.fold(&tally, &params);
                    }
                },
                BatchSize::SmallInput,
            )
        });
    group.finish();
}

/// Builds a committee-sized full-mesh DAG of `rounds` layers and returns the
/// store plus the round-0 proposer id, for `classify` to walk.
fn build_dag(committee_size: u8, rounds: u64) -> (DagStore, VertexId) {
    let store = DagStore::new();
    let mut last_round: Vec<VertexId> = Vec::new();
    let mut proposer_id = VertexId::ZERO;
    for round in 0..rounds {
        let parents = last_round.clone();
        let mut ids = Vec::with_capacity(committee_size as usize);
        for author in 0..committee_size {
            let vertex = Vertex::new_for_test(NodeId::new_for_test(author), round, parents.clone());
            let id = vertex.id();
            match store.insert(vertex) {
                InsertOutcome::Inserted(_) => {}
                InsertOutcome::MissingParent(missing) => {
                    panic!("benchmark DAG produced an unresolvable parent: {missing:?}")
                }
            }
            if round == 0 && author == 0 {
                proposer_id = id;
            }
            ids.push(id);
        }
        last_round = ids;
    }
    (store, proposer_id)
}

fn classify_committed_proposer(c: &mut Criterion) {
    let context = Context::new_for_test(100);
    let (store, proposer_id) = build_dag(100, 3);

    let mut group = c.benchmark_group("DagPredicates");
    group
        .throughput(Throughput::Elements(1))
        .bench_function("classify_committed_proposer", |b| {
            b.iter(|| classify(&store, &context.committee, proposer_id, 0))
        });
    group.finish();
}

criterion_group!(predicate_benches, fold_unanimous_tally, classify_committed_proposer);
criterion_main!(predicate_benches);
