// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sampling Engine (component C, §4.2): repeatedly queries a random subset
//! of `k` peers for their current preference on a choice set and folds the
//! responses into that choice's `ConfidenceCounter`. Concurrency is modeled
//! on the teacher's `broadcaster.rs` (`FuturesUnordered` + per-peer
//! timeout), and peer selection on `ancestor.rs`'s `AncestorStateManager`
//! (excluding self, a flat `Vec` indexed by committee position).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consensus_config::{Committee, NodeId, Parameters};
use consensus_types::{ConsensusResult, VertexId};
use futures::stream::FuturesUnordered;
use futures::StreamExt as _;
use rand::seq::SliceRandom as _;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::confidence::{ConfidenceCounter, FoldOutcome};
use crate::context::Context;
use crate::signals::StopWaiter;

/// Queries a single remote peer for its current preference on a vertex's
/// choice set. A real implementation backs this with the network client;
/// tests back it with an in-memory stub.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query_preference(
        &self,
        peer: NodeId,
        subject: VertexId,
    ) -> ConsensusResult<VertexId>;
}

/// Per-peer budget for a single query within a poll round.
const QUERY_TIMEOUT: Duration = Duration::from_millis(500);

/// Outcome of one poll round: either the tally was folded into a confidence
/// counter, or the round was cancelled before it could complete, in which
/// case its partial tally is discarded and no counter is touched (§4.2:
/// "the round aborts cleanly if the enclosing poll is cancelled").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Folded(FoldOutcome),
    Cancelled,
}

/// Drives poll rounds for a set of in-flight choices, each tracked by its
/// own `ConfidenceCounter`.
pub struct SamplingEngine<C> {
    context: Arc<Context>,
    client: Arc<C>,
    counters: HashMap<VertexId, ConfidenceCounter>,
    stop: StopWaiter,
}

impl<C: QueryClient> SamplingEngine<C> {
    pub fn new(context: Arc<Context>, client: Arc<C>) -> Self {
        let stop = context.stop.waiter();
        Self {
            context,
            client,
            counters: HashMap::new(),
            stop,
        }
    }

    pub fn counter(&self, subject: VertexId) -> Option<&ConfidenceCounter> {
        self.counters.get(&subject)
    }

    pub fn is_finalized(&self, subject: VertexId) -> bool {
        self.counters
            .get(&subject)
            .map(ConfidenceCounter::is_finalized)
            .unwrap_or(false)
    }

    /// Samples `k` distinct peers (excluding self), queries each concurrently
    /// for `subject`'s preference, and folds the tally into `subject`'s
    /// confidence counter. Returns the fold outcome, `NoQuorum` if fewer
    /// than `alpha_preference` peers answered within `QUERY_TIMEOUT`, or
    /// `Cancelled` if the authority's stop signal fired mid-round (§4.2:
    /// the round then aborts cleanly and its partial tally is discarded).
    pub async fn poll_round(&mut self, subject: VertexId) -> PollOutcome {
        self.context.metrics.poll_rounds_total.inc();

        if self.stop.is_stopped() {
            return PollOutcome::Cancelled;
        }

        let peers = sample_peers(&self.context.committee, self.context.own_id, self.context.parameters.k);
        if peers.is_empty() {
            self.context.metrics.poll_rounds_empty_total.inc();
            return PollOutcome::Folded(FoldOutcome::NoQuorum);
        }

        let mut futs = FuturesUnordered::new();
        for peer in peers {
            let client = self.client.clone();
            futs.push(async move {
                timeout(QUERY_TIMEOUT, client.query_preference(peer, subject)).await
            });
        }

        let mut tally: HashMap<VertexId, usize> = HashMap::new();
        let mut stop = self.stop.clone();
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    debug!(?subject, "poll round cancelled; discarding partial tally");
                    return PollOutcome::Cancelled;
                }
                maybe_result = futs.next() => {
                    match maybe_result {
                        Some(Ok(Ok(chit))) => {
                            *tally.entry(chit).or_insert(0) += 1;
                        }
                        Some(Ok(Err(e))) => trace!("query failed: {e:?}"),
                        Some(Err(_)) => trace!("query timed out"),
                        None => break,
                    }
                }
            }
        }

        if tally.is_empty() {
            self.context.metrics.poll_rounds_empty_total.inc();
            return PollOutcome::Folded(FoldOutcome::NoQuorum);
        }

        let counter = self.counters.entry(subject).or_insert_with(ConfidenceCounter::new);
        let outcome = counter.fold(&tally, &self.context.parameters);
        match outcome {
            FoldOutcome::Flipped => self.context.metrics.confidence_flips_total.inc(),
            FoldOutcome::Finalized => self.context.metrics.confidence_finalized_total.inc(),
            _ => {}
        }
        debug!(?subject, ?outcome, "poll round folded");
        PollOutcome::Folded(outcome)
    }
}

/// Samples exactly `k` distinct authorities from `committee`, excluding
/// `self_id`. Returns an empty bag rather than a short one when fewer than
/// `k` peers are reachable (§4.2 Failure: an under-supplied committee must
/// not silently relax the quorum requirement).
fn sample_peers(committee: &Committee, self_id: NodeId, k: usize) -> Vec<NodeId> {
    let mut candidates: Vec<NodeId> = committee
        .authorities()
        .map(|(_, a)| a.node_id)
        .filter(|id| *id != self_id)
        .collect();
    if candidates.len() < k {
        return Vec::new();
    }
    let mut rng = rand::thread_rng();
    candidates.shuffle(&mut rng);
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubClient {
        answer: VertexId,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryClient for StubClient {
        async fn query_preference(
            &self,
            _peer: NodeId,
            _subject: VertexId,
        ) -> ConsensusResult<VertexId> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    struct FlakyClient {
        good: Mutex<bool>,
    }

    #[async_trait]
    impl QueryClient for FlakyClient {
        async fn query_preference(
            &self,
            _peer: NodeId,
            subject: VertexId,
        ) -> ConsensusResult<VertexId> {
            Ok(subject)
        }
    }

    #[tokio::test]
    async fn unanimous_peers_flip_then_finalize() {
        let subject = VertexId::from_bytes([7; 32]);
        // 5 authorities, self excluded, leaves exactly k=4 peers.
        let context = Arc::new(Context::new_for_test(5));
        let client = Arc::new(StubClient {
            answer: subject,
            calls: AtomicUsize::new(0),
        });
        let mut engine = SamplingEngine::new(context.clone(), client);

        // Parameters::local() -> k=4, alpha_preference=3, alpha_confidence=3, beta=4.
        assert_eq!(engine.poll_round(subject).await, PollOutcome::Folded(FoldOutcome::Flipped));
        for _ in 0..2 {
            assert_eq!(engine.poll_round(subject).await, PollOutcome::Folded(FoldOutcome::Reinforced));
        }
        assert_eq!(engine.poll_round(subject).await, PollOutcome::Folded(FoldOutcome::Finalized));
        assert!(engine.is_finalized(subject));
    }

    #[tokio::test]
    async fn echo_client_converges_on_subject_itself() {
        let subject = VertexId::from_bytes([9; 32]);
        let context = Arc::new(Context::new_for_test(5));
        let client = Arc::new(FlakyClient { good: Mutex::new(true) });
        let mut engine = SamplingEngine::new(context, client);
        let outcome = engine.poll_round(subject).await;
        assert_eq!(outcome, PollOutcome::Folded(FoldOutcome::Flipped));
    }

    #[tokio::test]
    async fn under_supplied_committee_yields_no_quorum() {
        let subject = VertexId::from_bytes([11; 32]);
        // 4 authorities, self excluded, leaves only 3 peers for k=4.
        let context = Arc::new(Context::new_for_test(4));
        let client = Arc::new(StubClient {
            answer: subject,
            calls: AtomicUsize::new(0),
        });
        let mut engine = SamplingEngine::new(context, client.clone());
        assert_eq!(engine.poll_round(subject).await, PollOutcome::Folded(FoldOutcome::NoQuorum));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stopped_authority_cancels_poll_round_without_folding() {
        let subject = VertexId::from_bytes([13; 32]);
        let context = Arc::new(Context::new_for_test(5));
        let client = Arc::new(StubClient {
            answer: subject,
            calls: AtomicUsize::new(0),
        });
        context.stop.stop();
        let mut engine = SamplingEngine::new(context, client.clone());
        assert_eq!(engine.poll_round(subject).await, PollOutcome::Cancelled);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(engine.counter(subject).is_none());
    }
}
